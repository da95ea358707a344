//! Bearer-token extractor for authenticated handlers

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::db::profiles;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Profile behind a valid access token
///
/// Taking `CurrentUser` as a handler argument makes the route require
/// authentication; the profile is re-read so that deleted accounts lose
/// access before their tokens expire.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Self> {
        let token = bearer_token(parts)?;
        let claims = state.tokens.verify_access_token(token)?;

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ApiError::Unauthorized("Token missing subject (sub) claim".to_string()))?;

        let profile = profiles::find_by_id(&state.db, id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

        Ok(CurrentUser {
            id,
            username: profile.username,
        })
    }
}

fn bearer_token(parts: &Parts) -> ApiResult<&str> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(ApiError::Unauthorized("Not authenticated".to_string()));
    }
    Ok(token.trim())
}
