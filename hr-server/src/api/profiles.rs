//! Own profile and public profile lookup

use axum::{extract::State, routing::get, Json, Router};
use hr_common::api::requests::ProfileUpdate;
use hr_common::api::types::ProfileOut;

use crate::api::{ApiJson, ApiPath};
use crate::auth::CurrentUser;
use crate::db::profiles;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile/me", get(get_my_profile).patch(update_my_profile))
        .route("/profiles/:username", get(get_profile))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Profile not found".to_string())
}

/// GET /api/profile/me
pub async fn get_my_profile(
    user: CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<Json<ProfileOut>> {
    let row = profiles::find_by_id(&state.db, user.id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ProfileOut::try_from(row)?))
}

/// PATCH /api/profile/me
///
/// Only `display_name`, `bio` and `avatar_url` are accepted.
pub async fn update_my_profile(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<ProfileOut>> {
    let changes = payload.trimmed();
    changes.validate()?;

    let row = if changes.is_empty() {
        profiles::find_by_id(&state.db, user.id)
            .await?
            .ok_or_else(not_found)?
    } else {
        profiles::update(&state.db, user.id, &changes).await?
    };
    Ok(Json(ProfileOut::try_from(row)?))
}

/// GET /api/profiles/:username (case-insensitive)
pub async fn get_profile(
    State(state): State<AppState>,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<Json<ProfileOut>> {
    let row = profiles::find_by_username(&state.db, &username)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ProfileOut::try_from(row)?))
}
