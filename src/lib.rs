pub mod api;
pub mod config;
pub mod control;
pub mod library;
pub mod playlist;
pub mod playout;
pub mod transcode;

use axum::Router;
use axum::extract::Extension;
use axum::routing::{get, post, put};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

//
// Re-export
//
pub use api::{
    AuthState, LoginRequest, PanelResponse, SetModeRequest, StatusResponse, UploadResponse,
    VideoListRequest, log_request_errors, panel_auth_middleware,
};
pub use config::Config;
pub use control::{ControlStore, NowPlaying, PAUSED_SENTINEL};
pub use library::{ALLOWED_EXTENSIONS, VideoLibrary, is_valid_video_name};
pub use playlist::{OrderingMode, PlaylistSelector, order};
pub use playout::{PlayoutLoop, Tick};
pub use transcode::{EncoderSettings, FfmpegTranscoder, Transcoder};

/// Default placeholder image name inside the workspace.
pub const PAUSE_IMAGE_FILE: &str = "paused_image.png";

#[derive(Clone)]
pub struct AppState {
    pub control: ControlStore,
    pub library: VideoLibrary,
    pub panel_password: String,
}

async fn init_workspace(workspace: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(workspace.join(library::VIDEOS_DIR)).await?;
    tokio::fs::create_dir_all(workspace.join(library::EXCLUSIVE_DIR)).await?;
    Ok(())
}

pub async fn run(config: Config) {
    let rtmp_url = config
        .rtmp_url
        .clone()
        .expect("RTMP endpoint must be set; Config::validate checks this");
    if config.panel_password == "change_me" {
        warn!("Panel password is still the default, set panel_password");
    }

    let workspace = PathBuf::from(&config.workspace);
    init_workspace(&workspace)
        .await
        .expect("Failed to create workspace directories");

    let control = ControlStore::new(&workspace);
    let library = VideoLibrary::new(&workspace);
    let pause_image = config
        .pause_image
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| workspace.join(PAUSE_IMAGE_FILE));

    let transcoder = FfmpegTranscoder::new(rtmp_url, EncoderSettings::from(&config));
    let playout = PlayoutLoop::new(
        control.clone(),
        library.clone(),
        transcoder,
        pause_image,
        Duration::from_secs(config.poll_interval_secs),
        Duration::from_secs(config.idle_wait_secs),
    );

    let state = AppState {
        control,
        library,
        panel_password: config.panel_password.clone(),
    };
    let auth = AuthState {
        password: config.panel_password.clone(),
    };

    // CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Panel routes (password-protected)
    let panel = Router::new()
        .route("/status", get(api::status))
        .route("/upload", post(api::upload_video))
        .route("/videos/{filename}", get(api::serve_video))
        .route("/mode", put(api::set_mode))
        .route("/custom-order", put(api::set_custom_order))
        .route("/priority", put(api::set_priority_list))
        .route("/force/{video}", post(api::force_next))
        .route("/pause", post(api::pause))
        .route("/resume", post(api::resume))
        .route_layer(axum::middleware::from_fn_with_state(
            auth,
            panel_auth_middleware,
        ));

    let app = Router::new()
        .route("/login", post(api::login))
        .route("/logout", post(api::logout))
        .merge(panel)
        .layer(axum::middleware::from_fn(log_request_errors))
        .layer(cors)
        .layer(Extension(state));

    let addr = format!("0.0.0.0:{}", config.listen_on_port);
    info!("Control panel listening on {addr}");
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind control panel");

    // The panel and the playout loop run as sibling tasks; the loop never
    // returns on its own.
    tokio::select! {
        result = axum::serve(listener, app) => {
            result.expect("Control panel server error");
        }
        _ = playout.run() => {
            error!("Playout loop exited");
        }
    }
}
