//! HTTP API handlers for hr-server
//!
//! Routes are grouped per resource and merged under `/api` by
//! [`crate::build_router`]. Body, query and path rejections are turned into
//! the API's `{"detail": ...}` envelope by the wrappers below.

pub mod auth;
pub mod health;
pub mod orgs;
pub mod personalities;
pub mod profiles;
pub mod reviews;
pub mod spa;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{request::Parts, StatusCode},
    Json, Router,
};
use hr_common::api::types::MemberRole;
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::orgs as org_db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub use health::health_routes;
pub use spa::frontend_routes;

/// All `/api` routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .merge(auth::routes())
        .merge(profiles::routes())
        .merge(orgs::routes())
        .merge(personalities::routes())
        .merge(reviews::routes())
}

/// JSON body with rejections rendered as 400 `{"detail": ...}`
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> ApiResult<Self> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge
            } else {
                ApiError::BadRequest(e.body_text())
            }
        })?;
        Ok(ApiJson(value))
    }
}

/// Query string with rejections rendered as 400 `{"detail": ...}`
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> ApiResult<Self> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(ApiQuery(value))
    }
}

/// Path parameters with rejections rendered as 400 `{"detail": ...}`
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> ApiResult<Self> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(ApiPath(value))
    }
}

/// Caller must be a creator or moderator of the organization
pub(crate) async fn require_moderator(
    db: &SqlitePool,
    org_id: &str,
    profile_id: Uuid,
) -> ApiResult<MemberRole> {
    match org_db::role_of(db, org_id, profile_id).await? {
        None => Err(ApiError::Forbidden(
            "Not a member of the organization".to_string(),
        )),
        Some(role) if role.can_moderate() => Ok(role),
        Some(_) => Err(ApiError::Forbidden("Insufficient permissions".to_string())),
    }
}
