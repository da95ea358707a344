//! Personalities within an organization

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use hr_common::api::query::{PersonalitySort, PAGE_LIMIT_DEFAULT, PAGE_LIMIT_MAX};
use hr_common::api::requests::{PersonalityCreate, PersonalityUpdate};
use hr_common::api::types::PersonalityOut;
use tracing::info;

use crate::api::{require_moderator, ApiJson, ApiPath, ApiQuery};
use crate::auth::CurrentUser;
use crate::db::{orgs, personalities};
use crate::error::ApiResult;
use crate::pagination::ListParams;
use crate::slug::slugify;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/orgs/:org_slug/personalities",
            get(list_personalities).post(create_personality),
        )
        .route(
            "/orgs/:org_slug/personalities/:personality_slug",
            get(get_personality)
                .patch(update_personality)
                .delete(delete_personality),
        )
}

/// GET /api/orgs/:org_slug/personalities
pub async fn list_personalities(
    State(state): State<AppState>,
    ApiPath(org_slug): ApiPath<String>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Vec<PersonalityOut>>> {
    let org = orgs::require_by_slug(&state.db, &org_slug).await?;
    let list = params.resolve::<PersonalitySort>(PAGE_LIMIT_DEFAULT, PAGE_LIMIT_MAX)?;
    let rows = personalities::list(&state.db, &org.id, &list).await?;

    let out = rows
        .into_iter()
        .map(PersonalityOut::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(out))
}

/// POST /api/orgs/:org_slug/personalities (creator or moderator)
pub async fn create_personality(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiPath(org_slug): ApiPath<String>,
    ApiJson(payload): ApiJson<PersonalityCreate>,
) -> ApiResult<(StatusCode, Json<PersonalityOut>)> {
    payload.validate()?;
    let org = orgs::require_by_slug(&state.db, &org_slug).await?;
    require_moderator(&state.db, &org.id, user.id).await?;

    let base_slug = slugify(&payload.name, "personality");
    let row = personalities::create(&state.db, &org.id, user.id, &payload, &base_slug).await?;
    info!(org = %org_slug, slug = %row.slug, "Personality created");

    Ok((StatusCode::CREATED, Json(PersonalityOut::try_from(row)?)))
}

/// GET /api/orgs/:org_slug/personalities/:personality_slug
pub async fn get_personality(
    State(state): State<AppState>,
    ApiPath((org_slug, personality_slug)): ApiPath<(String, String)>,
) -> ApiResult<Json<PersonalityOut>> {
    let org = orgs::require_by_slug(&state.db, &org_slug).await?;
    let row = personalities::require_by_slug(&state.db, &org.id, &personality_slug).await?;
    Ok(Json(PersonalityOut::try_from(row)?))
}

/// PATCH /api/orgs/:org_slug/personalities/:personality_slug (creator or moderator)
pub async fn update_personality(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiPath((org_slug, personality_slug)): ApiPath<(String, String)>,
    ApiJson(payload): ApiJson<PersonalityUpdate>,
) -> ApiResult<Json<PersonalityOut>> {
    payload.validate()?;
    let org = orgs::require_by_slug(&state.db, &org_slug).await?;
    let existing = personalities::require_by_slug(&state.db, &org.id, &personality_slug).await?;
    require_moderator(&state.db, &org.id, user.id).await?;

    let row = personalities::update(&state.db, &existing, &payload).await?;
    Ok(Json(PersonalityOut::try_from(row)?))
}

/// DELETE /api/orgs/:org_slug/personalities/:personality_slug (creator or moderator)
///
/// Reviews go with the personality and leave the organization's counters.
pub async fn delete_personality(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiPath((org_slug, personality_slug)): ApiPath<(String, String)>,
) -> ApiResult<StatusCode> {
    let org = orgs::require_by_slug(&state.db, &org_slug).await?;
    let existing = personalities::require_by_slug(&state.db, &org.id, &personality_slug).await?;
    require_moderator(&state.db, &org.id, user.id).await?;

    personalities::delete(&state.db, &existing.id).await?;
    info!(org = %org_slug, slug = %personality_slug, "Personality deleted");
    Ok(StatusCode::NO_CONTENT)
}
