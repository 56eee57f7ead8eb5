//! Router

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::warn;

use super::{handlers, AppState};

const CORS_MAX_AGE: std::time::Duration = std::time::Duration::from_secs(3600);

/// Build the `/api/v1` router
pub fn create_router(state: Arc<AppState>) -> Router {
    let users = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/refresh-token", post(handlers::refresh_token))
        .route("/change-password", post(handlers::change_password))
        .route("/current-user", get(handlers::current_user))
        .route("/update-account", patch(handlers::update_account))
        .route("/avatar", patch(handlers::update_avatar))
        .route("/cover-image", patch(handlers::update_cover_image));

    let cors = cors_layer(state.cors_origin.as_deref());
    let body_limit = state.body_limit;

    // The body limit wraps the routes in its own layer call so that CORS sees
    // axum's response body rather than the limit's.
    Router::new()
        .route("/api/v1/healthcheck", get(handlers::healthcheck))
        .nest("/api/v1/users", users)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                // Multipart bodies are capped by the tower-http limit alone.
                .layer(DefaultBodyLimit::disable()),
        )
        .with_state(state)
}

/// Listed origins may send credentials. Without a list any origin is allowed,
/// but cookies are not.
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
        ])
        .max_age(CORS_MAX_AGE);

    match origins {
        Some(origins) => {
            let list: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| match HeaderValue::from_str(s) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("ignoring invalid CORS origin: {}", s);
                        None
                    }
                })
                .collect();
            layer
                .allow_origin(AllowOrigin::list(list))
                .allow_credentials(true)
        }
        None => {
            warn!("no CORS origin configured; cross-origin requests are allowed without credentials");
            layer.allow_origin(AllowOrigin::any())
        }
    }
}
