//! Personality queries

use hr_common::api::query::PersonalitySort;
use hr_common::api::requests::{PersonalityCreate, PersonalityUpdate};
use hr_common::db::PersonalityRow;
use hr_common::uuid_utils;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::db::orgs::push_window;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::pagination::{like_pattern, ResolvedList};
use crate::slug::{candidate, MAX_SLUG_ATTEMPTS};

const PERSONALITY_COLUMNS: &str = "p.id AS id, p.org_id AS org_id, p.name AS name, \
     p.slug AS slug, p.description AS description, p.created_by AS created_by, \
     p.total_reviews AS total_reviews, p.average_review AS average_review, \
     p.created_at AS created_at, p.updated_at AS updated_at";

const RETURNING: &str = "RETURNING id, org_id, name, slug, description, created_by, \
     total_reviews, average_review, created_at, updated_at";

fn name_conflict() -> ApiError {
    ApiError::Conflict("A personality with this name already exists".to_string())
}

pub async fn find_by_slug(
    pool: &SqlitePool,
    org_id: &str,
    slug: &str,
) -> ApiResult<Option<PersonalityRow>> {
    let row = sqlx::query_as::<_, PersonalityRow>(&format!(
        "SELECT {} FROM personalities p WHERE p.org_id = ? AND p.slug = ?",
        PERSONALITY_COLUMNS
    ))
    .bind(org_id)
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn require_by_slug(pool: &SqlitePool, org_id: &str, slug: &str) -> ApiResult<PersonalityRow> {
    find_by_slug(pool, org_id, slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Personality not found".to_string()))
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> ApiResult<Option<PersonalityRow>> {
    let row = sqlx::query_as::<_, PersonalityRow>(&format!(
        "SELECT {} FROM personalities p WHERE p.id = ?",
        PERSONALITY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Page of an organization's personalities; search matches name or description
pub async fn list(
    pool: &SqlitePool,
    org_id: &str,
    list: &ResolvedList<PersonalitySort>,
) -> ApiResult<Vec<PersonalityRow>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM personalities p WHERE p.org_id = ",
        PERSONALITY_COLUMNS
    ));
    qb.push_bind(org_id.to_string());

    if let Some(search) = &list.search {
        let pattern = like_pattern(search);
        qb.push(" AND (p.name LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR p.description LIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\')");
    }
    push_window(&mut qb, list, "p.id");

    let rows = qb.build_query_as::<PersonalityRow>().fetch_all(pool).await?;
    Ok(rows)
}

/// Names are unique per organization, ignoring case
async fn name_taken(
    pool: &SqlitePool,
    org_id: &str,
    name: &str,
    except_id: Option<&str>,
) -> ApiResult<bool> {
    let found: Option<String> = sqlx::query_scalar(
        "SELECT id FROM personalities \
         WHERE org_id = ? AND name = ? COLLATE NOCASE AND id IS NOT ?",
    )
    .bind(org_id)
    .bind(name.trim())
    .bind(except_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

/// Create a personality and bump the organization's counter
pub async fn create(
    pool: &SqlitePool,
    org_id: &str,
    creator: Uuid,
    payload: &PersonalityCreate,
    base_slug: &str,
) -> ApiResult<PersonalityRow> {
    if name_taken(pool, org_id, &payload.name, None).await? {
        return Err(name_conflict());
    }

    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let slug = candidate(base_slug, attempt);
        let mut tx = pool.begin().await?;

        let inserted = sqlx::query_as::<_, PersonalityRow>(&format!(
            "INSERT INTO personalities (id, org_id, name, slug, description, created_by) \
             VALUES (?, ?, ?, ?, ?, ?) {}",
            RETURNING
        ))
        .bind(uuid_utils::generate().to_string())
        .bind(org_id)
        .bind(payload.name.trim())
        .bind(&slug)
        .bind(payload.description.as_deref().map(str::trim))
        .bind(creator.to_string())
        .fetch_one(&mut *tx)
        .await;

        let personality = match inserted {
            Ok(row) => row,
            Err(e) if is_unique_violation(&e) => {
                drop(tx);
                // Either the slug or (after a race) the name collided
                if name_taken(pool, org_id, &payload.name, None).await? {
                    return Err(name_conflict());
                }
                debug!(slug = %slug, "Personality slug taken, trying next");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        sqlx::query(
            "UPDATE organizations SET personalities_count = personalities_count + 1 WHERE id = ?",
        )
        .bind(org_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        return Ok(personality);
    }

    Err(ApiError::Internal(
        "Unable to generate unique slug for personality".to_string(),
    ))
}

/// Partial update; the slug never changes
pub async fn update(
    pool: &SqlitePool,
    existing: &PersonalityRow,
    changes: &PersonalityUpdate,
) -> ApiResult<PersonalityRow> {
    if let Some(name) = &changes.name {
        if name_taken(pool, &existing.org_id, name, Some(&existing.id)).await? {
            return Err(name_conflict());
        }
    }

    let updated = sqlx::query_as::<_, PersonalityRow>(&format!(
        "UPDATE personalities SET \
             name = COALESCE(?, name), \
             description = COALESCE(?, description) \
         WHERE id = ? {}",
        RETURNING
    ))
    .bind(changes.name.as_deref().map(str::trim))
    .bind(changes.description.as_deref().map(str::trim))
    .bind(&existing.id)
    .fetch_optional(pool)
    .await;

    match updated {
        Ok(Some(row)) => Ok(row),
        Ok(None) => Err(ApiError::NotFound("Personality not found".to_string())),
        Err(e) if is_unique_violation(&e) => Err(name_conflict()),
        Err(e) => Err(e.into()),
    }
}

/// Delete a personality (reviews cascade) and shrink the org's counters
pub async fn delete(pool: &SqlitePool, personality_id: &str) -> ApiResult<()> {
    let mut tx = pool.begin().await?;

    let deleted: Option<(String, i64)> = sqlx::query_as(
        "DELETE FROM personalities WHERE id = ? RETURNING org_id, total_reviews",
    )
    .bind(personality_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (org_id, total_reviews) =
        deleted.ok_or_else(|| ApiError::NotFound("Personality not found".to_string()))?;

    sqlx::query(
        "UPDATE organizations SET \
             personalities_count = MAX(personalities_count - 1, 0), \
             reviews_count = MAX(reviews_count - ?, 0) \
         WHERE id = ?",
    )
    .bind(total_reviews)
    .bind(&org_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
