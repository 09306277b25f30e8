pub mod middleware;
pub mod routes;

pub use middleware::{AuthState, log_request_errors, panel_auth_middleware};
pub use routes::{
    LoginRequest, PanelResponse, SetModeRequest, StatusResponse, UploadResponse, VideoListRequest,
    force_next, login, logout, pause, resume, serve_video, set_custom_order, set_priority_list,
    set_mode, status, upload_video,
};
