use crate::AppState;
use crate::api::middleware::AUTH_COOKIE;
use crate::library::is_valid_video_name;
use crate::playlist::OrderingMode;
use axum::body::Body;
use axum::extract::{Extension, Path as AxumPath, Query, Request};
use axum::http::{Response, StatusCode, header};
use axum::response::{IntoResponse, Json, Response as AxumResponse};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::io::AsyncSeekExt;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

#[derive(Serialize, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct PanelResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    pub now_playing: Option<String>,
    pub paused: bool,
    pub mode: OrderingMode,
    pub videos: Vec<String>,
    pub exclusive_videos: Vec<String>,
    pub custom_order: Vec<String>,
    pub priority_list: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct UploadParams {
    pub filename: String,
    #[serde(default)]
    pub exclusive: bool,
}

#[derive(Serialize, Deserialize)]
pub struct ServeParams {
    #[serde(default)]
    pub exclusive: bool,
}

#[derive(Serialize, Deserialize)]
pub struct SetModeRequest {
    pub mode: OrderingMode,
}

#[derive(Serialize, Deserialize)]
pub struct VideoListRequest {
    pub videos: Vec<String>,
}

/// `POST /login`: matches the configured password and hands out the panel
/// cookie.
pub async fn login(
    Extension(state): Extension<AppState>,
    Json(request): Json<LoginRequest>,
) -> AxumResponse {
    if request.password != state.panel_password {
        warn!("Login attempt with a wrong password");
        return err_response(StatusCode::UNAUTHORIZED, "Bad password").into_response();
    }

    let cookie = format!("{AUTH_COOKIE}={}; Path=/; HttpOnly", state.panel_password);
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(PanelResponse {
            message: "Logged in".to_string(),
        }),
    )
        .into_response()
}

pub async fn logout() -> AxumResponse {
    let cookie = format!("{AUTH_COOKIE}=; Path=/; Max-Age=0");
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(PanelResponse {
            message: "Logged out".to_string(),
        }),
    )
        .into_response()
}

/// `GET /status`: everything the panel displays in one round trip.
#[axum::debug_handler]
pub async fn status(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(StatusResponse {
            now_playing: state.control.now_playing(),
            paused: state.control.paused(),
            mode: state.control.ordering_mode(),
            videos: state.library.normal_names(),
            exclusive_videos: state.library.exclusive_names(),
            custom_order: state.control.custom_order(),
            priority_list: state.control.priority_list(),
        }),
    )
}

/// `POST /upload?filename=...&exclusive=...`: raw request body streamed
/// straight into the chosen library directory.
pub async fn upload_video(
    Extension(state): Extension<AppState>,
    Query(params): Query<UploadParams>,
    body: Body,
) -> impl IntoResponse {
    let filename = params.filename;

    if !is_valid_video_name(&filename) {
        return (
            StatusCode::BAD_REQUEST,
            Json(UploadResponse {
                filename,
                message: "Invalid video name or extension".to_string(),
            }),
        );
    }

    info!(%filename, exclusive = params.exclusive, "Uploading file");

    let dest = state.library.dir_for(params.exclusive).join(&filename);
    let Ok(mut file) = tokio::fs::File::create(&dest).await else {
        error!(%filename, "Failed to create upload file");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(UploadResponse {
                filename,
                message: "Failed to create upload file".to_string(),
            }),
        );
    };

    use futures::StreamExt as _;
    use tokio::io::AsyncWriteExt as _;
    let mut body_stream = body.into_data_stream();
    while let Some(Ok(chunk)) = body_stream.next().await {
        if file.write_all(&chunk).await.is_err() {
            error!(%filename, "Failed to write to upload file");
            let _ = tokio::fs::remove_file(&dest).await;
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(UploadResponse {
                    filename,
                    message: "Failed to write to upload file".to_string(),
                }),
            );
        }
    }

    if file.flush().await.is_err() {
        error!(%filename, "Failed to flush upload file");
        let _ = tokio::fs::remove_file(&dest).await;
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(UploadResponse {
                filename,
                message: "Failed to flush upload file".to_string(),
            }),
        );
    }

    (
        StatusCode::CREATED,
        Json(UploadResponse {
            filename,
            message: "Uploaded".to_string(),
        }),
    )
}

pub(crate) fn parse_range(req: &Request, file_size: u64) -> (StatusCode, u64, u64) {
    if let Some(rh) = req.headers().get(header::RANGE)
        && let Ok(s) = rh.to_str()
        && let Some(stripped) = s.strip_prefix("bytes=")
        && let parts = stripped.split('-').collect::<Vec<_>>()
        && let Ok(start) = parts[0].parse::<u64>()
    {
        let end = parts
            .get(1)
            .and_then(|e| e.parse::<u64>().ok())
            .unwrap_or(file_size - 1);
        return (StatusCode::PARTIAL_CONTENT, start, end.min(file_size - 1));
    }

    (StatusCode::OK, 0, file_size - 1)
}

/// `GET /videos/{filename}?exclusive=...`: serve a library file for preview
/// or download, with Range support for seeking.
pub async fn serve_video(
    Extension(state): Extension<AppState>,
    AxumPath(filename): AxumPath<String>,
    Query(params): Query<ServeParams>,
    req: Request,
) -> Result<Response<Body>, Infallible> {
    if !is_valid_video_name(&filename) {
        warn!(%filename, "Invalid video name");
        return Ok(err_response(StatusCode::BAD_REQUEST, "Invalid video name"));
    }

    let path = state.library.dir_for(params.exclusive).join(&filename);
    let Ok(metadata) = tokio::fs::metadata(&path).await else {
        return Ok(file_not_found());
    };
    let size = metadata.len();
    if size == 0 {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, "0")
            .body(Body::empty())
            .unwrap());
    }

    let (status, start, end) = parse_range(&req, size);
    if start > end {
        return Ok(err_response(
            StatusCode::RANGE_NOT_SATISFIABLE,
            "Invalid range",
        ));
    }
    let len = end - start + 1;

    let Ok(mut fh) = tokio::fs::File::open(&path).await else {
        error!(%filename, "Failed to open library file");
        return Ok(file_not_found());
    };
    if fh.seek(std::io::SeekFrom::Start(start)).await.is_err() {
        error!(%filename, "Failed to seek library file");
        return Ok(file_not_found());
    }

    use tokio::io::AsyncReadExt as _;
    let stream = ReaderStream::new(fh.take(len));

    let mut res = Response::new(Body::from_stream(stream));
    *res.status_mut() = status;
    let headers = res.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string()
            .parse()
            .unwrap(),
    );
    headers.insert(header::ACCEPT_RANGES, "bytes".parse().unwrap());
    headers.insert(header::CONTENT_LENGTH, len.to_string().parse().unwrap());
    if status == StatusCode::PARTIAL_CONTENT {
        headers.insert(
            header::CONTENT_RANGE,
            format!("bytes {start}-{end}/{size}").parse().unwrap(),
        );
    }
    Ok(res)
}

/// `PUT /mode`: typed deserialization rejects unknown tokens before they
/// ever reach the mode file.
pub async fn set_mode(
    Extension(state): Extension<AppState>,
    Json(request): Json<SetModeRequest>,
) -> impl IntoResponse {
    state.control.set_ordering_mode(request.mode);
    info!(mode = request.mode.as_str(), "Ordering mode updated");
    (
        StatusCode::OK,
        Json(PanelResponse {
            message: format!("Ordering mode set to {}", request.mode.as_str()),
        }),
    )
}

fn store_video_list(
    videos: Vec<String>,
    write: impl FnOnce(&[String]),
    what: &str,
) -> (StatusCode, Json<PanelResponse>) {
    if let Some(bad) = videos.iter().find(|name| !is_valid_video_name(name)) {
        return (
            StatusCode::BAD_REQUEST,
            Json(PanelResponse {
                message: format!("Invalid video name in {what}: {bad:?}"),
            }),
        );
    }

    write(&videos);
    info!(count = videos.len(), what, "Video list updated");
    (
        StatusCode::OK,
        Json(PanelResponse {
            message: format!("{what} updated"),
        }),
    )
}

/// `PUT /custom-order`: overwrite the custom-mode ordering wholesale.
pub async fn set_custom_order(
    Extension(state): Extension<AppState>,
    Json(request): Json<VideoListRequest>,
) -> impl IntoResponse {
    store_video_list(
        request.videos,
        |videos| state.control.set_custom_order(videos),
        "custom order",
    )
}

/// `PUT /priority`: overwrite the list-then-random priority list wholesale.
pub async fn set_priority_list(
    Extension(state): Extension<AppState>,
    Json(request): Json<VideoListRequest>,
) -> impl IntoResponse {
    store_video_list(
        request.videos,
        |videos| state.control.set_priority_list(videos),
        "priority list",
    )
}

/// `POST /force/{video}`: queue a single-use force-next request. Existence
/// is resolved by the playout loop at consumption time.
pub async fn force_next(
    Extension(state): Extension<AppState>,
    AxumPath(video): AxumPath<String>,
) -> impl IntoResponse {
    if !is_valid_video_name(&video) {
        return (
            StatusCode::BAD_REQUEST,
            Json(PanelResponse {
                message: "Invalid video name".to_string(),
            }),
        );
    }

    state.control.set_force_request(&video);
    info!(%video, "Force-next requested");
    (
        StatusCode::ACCEPTED,
        Json(PanelResponse {
            message: format!("Will play {video} next"),
        }),
    )
}

pub async fn pause(Extension(state): Extension<AppState>) -> impl IntoResponse {
    state.control.set_paused(true);
    info!("Stream paused");
    (
        StatusCode::OK,
        Json(PanelResponse {
            message: "Stream paused".to_string(),
        }),
    )
}

pub async fn resume(Extension(state): Extension<AppState>) -> impl IntoResponse {
    state.control.set_paused(false);
    info!("Stream resumed");
    (
        StatusCode::OK,
        Json(PanelResponse {
            message: "Stream resumed".to_string(),
        }),
    )
}

fn file_not_found() -> Response<Body> {
    err_response(StatusCode::NOT_FOUND, "File not found")
}

pub(crate) fn err_response(status: StatusCode, body_str: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::from(body_str))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_range(range: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/videos/a.mp4");
        if let Some(range) = range {
            builder = builder.header(header::RANGE, range);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn no_range_serves_the_whole_file() {
        let req = request_with_range(None);
        assert_eq!(parse_range(&req, 1000), (StatusCode::OK, 0, 999));
    }

    #[test]
    fn open_ended_range_runs_to_the_end() {
        let req = request_with_range(Some("bytes=100-"));
        assert_eq!(
            parse_range(&req, 1000),
            (StatusCode::PARTIAL_CONTENT, 100, 999)
        );
    }

    #[test]
    fn bounded_range_is_clamped_to_the_file() {
        let req = request_with_range(Some("bytes=0-99"));
        assert_eq!(
            parse_range(&req, 1000),
            (StatusCode::PARTIAL_CONTENT, 0, 99)
        );

        let req = request_with_range(Some("bytes=900-5000"));
        assert_eq!(
            parse_range(&req, 1000),
            (StatusCode::PARTIAL_CONTENT, 900, 999)
        );
    }

    #[test]
    fn malformed_range_falls_back_to_the_whole_file() {
        for bad in ["bytes=-", "bytes=abc-def", "items=0-99"] {
            let req = request_with_range(Some(bad));
            assert_eq!(parse_range(&req, 1000), (StatusCode::OK, 0, 999), "{bad}");
        }
    }
}
