use crate::api::routes::err_response;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{error, warn};

/// Cookie set by `POST /login` and accepted by the auth middleware.
pub const AUTH_COOKIE: &str = "auth";

#[derive(Clone)]
pub struct AuthState {
    pub password: String,
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Guards the panel routes. A request passes with either the `auth` cookie
/// (browser panel) or a bearer token (scripted operators); both must carry
/// the configured password.
pub async fn panel_auth_middleware(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    let cookie_ok = cookie_value(req.headers(), AUTH_COOKIE)
        .map(|value| value == auth.password)
        .unwrap_or(false);
    let bearer_ok = bearer_token(req.headers())
        .map(|token| token == auth.password)
        .unwrap_or(false);

    if !cookie_ok && !bearer_ok {
        warn!(uri = %req.uri(), "Unauthenticated panel request");
        return err_response(StatusCode::UNAUTHORIZED, "Authentication required");
    }

    next.run(req).await
}

/// Logs 4xx/5xx responses with their route so panel misuse shows up in the
/// service log.
pub async fn log_request_errors(req: Request<Body>, next: Next) -> Response {
    let uri = req.uri().clone();
    let method = req.method().clone();

    let response = next.run(req).await;
    let status = response.status();
    if status.is_client_error() {
        warn!(method = %method, uri = %uri, status = %status, "Client error");
    } else if status.is_server_error() {
        error!(method = %method, uri = %uri, status = %status, "Server error");
    }

    response
}
