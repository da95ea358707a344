//! hr-server library - HonestReviews REST API
//!
//! Profiles, organizations, personalities and reviews over SQLite, with
//! JWT access tokens and rotating refresh tokens. The binary in `main.rs`
//! resolves configuration and serves [`build_router`].

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod api;
pub mod auth;
pub mod config;
pub mod cursor;
pub mod db;
pub mod error;
pub mod pagination;
pub mod slug;

use auth::TokenService;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;
use config::ServerConfig;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Token issuing and verification
    pub tokens: Arc<TokenService>,
    /// Resolved configuration
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, config: ServerConfig) -> Self {
        Self {
            db,
            tokens: Arc::new(TokenService::new(config.auth.clone())),
            config: Arc::new(config),
        }
    }
}

/// Build application router
///
/// API routes live under `/api`; `/` and unmatched paths belong to the
/// optional frontend. Every response carries the framing and sniffing
/// protection headers.
pub fn build_router(state: AppState) -> Router {
    let frontend = api::frontend_routes(state.config.http.frontend_dist.as_deref());
    let cors = cors_layer(&state.config.http.allowed_origins);

    Router::new()
        .nest("/api", api::api_routes())
        .merge(frontend)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// CORS for the configured browser origins, credentials allowed
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-requested-with"),
        ])
        .max_age(std::time::Duration::from_secs(600))
}
