//! Built frontend (single-page app) serving
//!
//! When a frontend build directory is configured and present, `/static/*` is
//! served from its `static/` folder and every other non-API path falls back
//! to `index.html`. Without one, `GET /` reports that the server is API-only.

use std::path::{Path, PathBuf};

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::AppState;

/// Routes for `/` and the SPA fallback
pub fn frontend_routes(dist: Option<&Path>) -> Router<AppState> {
    match dist {
        Some(dist) if dist.is_dir() => {
            info!("Serving frontend from {}", dist.display());
            let index = dist.join("index.html");
            let static_dir = dist.join("static");

            let mut router = Router::new();
            if static_dir.is_dir() {
                router = router.nest_service("/static", ServeDir::new(static_dir));
            }
            router.fallback(move || serve_index(index.clone()))
        }
        Some(dist) => {
            warn!(
                "Frontend directory {} not found; running API-only",
                dist.display()
            );
            api_only()
        }
        None => api_only(),
    }
}

fn api_only() -> Router<AppState> {
    Router::new().route("/", get(|| async { Json(json!({ "status": "api-only" })) }))
}

async fn serve_index(index: PathBuf) -> Response {
    match tokio::fs::read(&index).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8")),
                (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Frontend not built").into_response(),
    }
}
