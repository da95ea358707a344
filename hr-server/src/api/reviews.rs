//! Reviews: keyset-paginated listing and aggregate-maintaining mutations

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use hr_common::api::query::{ReviewSort, REVIEW_LIMIT_DEFAULT, REVIEW_LIMIT_MAX};
use hr_common::api::requests::{ReviewCreate, ReviewUpdate};
use hr_common::api::types::{ReviewListItem, ReviewOut, ReviewPage, ReviewStats};
use hr_common::db::{PersonalityRow, ReviewRow};
use hr_common::uuid_utils::parse_column;
use hr_common::validation;
use hr_common::Aggregate;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::api::{ApiJson, ApiPath, ApiQuery};
use crate::auth::CurrentUser;
use crate::cursor::ReviewCursor;
use crate::db::reviews::{self, ReviewPageQuery};
use crate::db::{orgs, personalities};
use crate::error::{ApiError, ApiResult};
use crate::pagination::cursor_limit;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/orgs/:org_slug/personalities/:personality_slug/reviews",
            get(list_reviews).post(create_review),
        )
        .route("/reviews/:review_id", patch(update_review).delete(delete_review))
}

/// Raw review list query; see [`ListParams`](crate::pagination::ListParams)
#[derive(Debug, Default, Deserialize)]
pub struct ReviewListParams {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub rating_min: Option<i64>,
    pub rating_max: Option<i64>,
}

impl ReviewListParams {
    fn resolve(self) -> ApiResult<ReviewPageQuery> {
        let sort = match self.sort.as_deref() {
            None => ReviewSort::default(),
            Some(value) => ReviewSort::parse(value)
                .ok_or_else(|| ApiError::BadRequest("Invalid sort field".to_string()))?,
        };
        validation::rating_range(self.rating_min, self.rating_max)?;

        Ok(ReviewPageQuery {
            sort,
            cursor: self
                .cursor
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .map(ReviewCursor::decode)
                .transpose()?,
            rating_min: self.rating_min,
            rating_max: self.rating_max,
            limit: cursor_limit(self.limit, REVIEW_LIMIT_DEFAULT, REVIEW_LIMIT_MAX)?,
        })
    }
}

async fn personality_by_slugs(
    db: &SqlitePool,
    org_slug: &str,
    personality_slug: &str,
) -> ApiResult<PersonalityRow> {
    let org = orgs::find_by_slug(db, org_slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Personality not found".to_string()))?;
    personalities::require_by_slug(db, &org.id, personality_slug).await
}

/// Reload a review with its (freshly updated) personality
async fn review_out(db: &SqlitePool, review_id: Uuid) -> ApiResult<ReviewOut> {
    let row = reviews::require_by_id(db, review_id).await?;
    let personality = personalities::find_by_id(db, &row.personality_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Personality not found".to_string()))?;
    reviews::to_review_out(row, &personality)
}

/// GET /api/orgs/:org_slug/personalities/:personality_slug/reviews
///
/// Returns `{items, next_cursor, stats}`; `stats` is the personality's stored
/// aggregate at the time of the request.
pub async fn list_reviews(
    State(state): State<AppState>,
    ApiPath((org_slug, personality_slug)): ApiPath<(String, String)>,
    ApiQuery(params): ApiQuery<ReviewListParams>,
) -> ApiResult<Json<ReviewPage>> {
    let query = params.resolve()?;
    let personality = personality_by_slugs(&state.db, &org_slug, &personality_slug).await?;

    let (rows, next_cursor) = reviews::list_page(&state.db, &personality.id, &query).await?;
    let items = rows
        .iter()
        .map(ReviewListItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let personality_id = parse_column("personalities.id", &personality.id)?;
    Ok(Json(ReviewPage {
        items,
        next_cursor,
        stats: ReviewStats::from_aggregate(
            personality_id,
            Aggregate::new(personality.total_reviews, personality.average_review),
        ),
    }))
}

/// POST /api/orgs/:org_slug/personalities/:personality_slug/reviews (members only)
pub async fn create_review(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiPath((org_slug, personality_slug)): ApiPath<(String, String)>,
    ApiJson(payload): ApiJson<ReviewCreate>,
) -> ApiResult<(StatusCode, Json<ReviewOut>)> {
    payload.validate()?;
    let personality = personality_by_slugs(&state.db, &org_slug, &personality_slug).await?;

    if orgs::role_of(&state.db, &personality.org_id, user.id)
        .await?
        .is_none()
    {
        return Err(ApiError::Forbidden(
            "Only members of the organization can create reviews".to_string(),
        ));
    }

    let id = reviews::create(&state.db, &personality, user.id, &payload).await?;
    Ok((StatusCode::CREATED, Json(review_out(&state.db, id).await?)))
}

fn is_author(review: &ReviewRow, user: &CurrentUser) -> bool {
    review.author_id.as_deref() == Some(user.id.to_string().as_str())
}

/// PATCH /api/reviews/:review_id (author only)
pub async fn update_review(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiPath(review_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ReviewUpdate>,
) -> ApiResult<Json<ReviewOut>> {
    payload.validate()?;
    let existing = reviews::require_by_id(&state.db, review_id).await?;

    if !is_author(&existing, &user) {
        return Err(ApiError::Forbidden("Not authorized".to_string()));
    }

    reviews::update(&state.db, &existing, &payload).await?;
    Ok(Json(review_out(&state.db, review_id).await?))
}

/// DELETE /api/reviews/:review_id (author, or org creator/moderator)
pub async fn delete_review(
    user: CurrentUser,
    State(state): State<AppState>,
    ApiPath(review_id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let existing = reviews::require_by_id(&state.db, review_id).await?;

    if !is_author(&existing, &user) {
        let personality = personalities::find_by_id(&state.db, &existing.personality_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Review not found".to_string()))?;
        let role = orgs::role_of(&state.db, &personality.org_id, user.id).await?;
        if !role.is_some_and(|r| r.can_moderate()) {
            return Err(ApiError::Forbidden("Not authorized".to_string()));
        }
    }

    reviews::delete(&state.db, &existing.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
