//! Typed wrappers for every HonestReviews endpoint
//!
//! Each wrapper validates its request body with the shared rules before
//! anything is sent, so invalid input never costs a round trip.

mod auth;
mod orgs;
mod personalities;
mod profiles;
mod reviews;

use reqwest::Method;
use serde::Deserialize;

use crate::error::ClientResult;
use crate::http::{ApiClient, Auth, NO_BODY};

/// `GET /health` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub module: String,
    pub version: String,
    pub database: String,
}

impl ApiClient {
    /// GET /health
    pub async fn health(&self) -> ClientResult<HealthStatus> {
        self.request(Method::GET, &["health"], &[], NO_BODY, Auth::None)
            .await
    }
}
