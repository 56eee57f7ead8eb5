//! HTTP surface
//!
//! ```text
//! /api/v1/healthcheck
//! /api/v1/users/{register,login,logout,refresh-token,change-password,
//!                current-user,update-account,avatar,cover-image}
//! ```

pub mod cookies;
pub mod extract;
pub mod handlers;
pub mod response;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::service::SessionManager;
use crate::config::AppConfig;

pub use cookies::CookiePolicy;
pub use extract::CurrentUser;
pub use response::ApiResponse;
pub use routes::create_router;

/// Shared handler state
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub cookies: CookiePolicy,
    /// Where multipart files are staged before upload
    pub upload_dir: PathBuf,
    pub body_limit: usize,
    /// Comma-separated allowed origins
    pub cors_origin: Option<String>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, config: &AppConfig) -> Self {
        let cookies = CookiePolicy::new(
            config.auth.secure_cookies,
            sessions.tokens().access_ttl(),
            sessions.tokens().refresh_ttl(),
        );

        Self {
            sessions,
            cookies,
            upload_dir: config.upload_dir.clone(),
            body_limit: config.body_limit_bytes,
            cors_origin: config.cors_origin.clone(),
        }
    }
}
