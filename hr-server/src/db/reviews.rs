//! Review queries and aggregate maintenance
//!
//! Every mutation runs in one transaction whose first statement is a write,
//! so SQLite takes the write lock before the aggregate is read back and
//! recomputed with [`Aggregate`].

use hr_common::api::query::ReviewSort;
use hr_common::api::requests::{ReviewCreate, ReviewUpdate};
use hr_common::api::types::{PersonalitySummary, ReviewOut};
use hr_common::db::{PersonalityRow, ReviewRow};
use hr_common::time::parse_db;
use hr_common::uuid_utils::{self, parse_column};
use hr_common::Aggregate;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cursor::ReviewCursor;
use crate::error::{ApiError, ApiResult};

const REVIEW_SELECT: &str = "SELECT r.id AS id, r.personality_id AS personality_id, \
     r.author_id AS author_id, r.title AS title, r.body AS body, r.rating AS rating, \
     r.created_at AS created_at, r.updated_at AS updated_at, \
     pr.username AS author_username, pr.display_name AS author_display_name, \
     pr.avatar_url AS author_avatar_url \
     FROM reviews r LEFT JOIN profiles pr ON pr.id = r.author_id";

/// Attempts at an update whose rating changed underneath it
const UPDATE_ATTEMPTS: usize = 3;

/// Filters and position for one review page
#[derive(Debug, Clone)]
pub struct ReviewPageQuery {
    pub sort: ReviewSort,
    pub cursor: Option<ReviewCursor>,
    pub rating_min: Option<i64>,
    pub rating_max: Option<i64>,
    pub limit: i64,
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> ApiResult<Option<ReviewRow>> {
    let row = sqlx::query_as::<_, ReviewRow>(&format!("{} WHERE r.id = ?", REVIEW_SELECT))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn require_by_id(pool: &SqlitePool, id: Uuid) -> ApiResult<ReviewRow> {
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Review not found".to_string()))
}

/// One keyset page plus the cursor of the page after it
///
/// Every sort ends in `created_at, id`, so the cursor position is total and
/// rows are never skipped or repeated between pages.
pub async fn list_page(
    pool: &SqlitePool,
    personality_id: &str,
    query: &ReviewPageQuery,
) -> ApiResult<(Vec<ReviewRow>, Option<String>)> {
    let mut qb = QueryBuilder::<Sqlite>::new(REVIEW_SELECT);
    qb.push(" WHERE r.personality_id = ");
    qb.push_bind(personality_id.to_string());

    if let Some(min) = query.rating_min {
        qb.push(" AND r.rating >= ");
        qb.push_bind(min);
    }
    if let Some(max) = query.rating_max {
        qb.push(" AND r.rating <= ");
        qb.push_bind(max);
    }
    if let Some(cursor) = &query.cursor {
        push_after_cursor(&mut qb, query.sort, cursor);
    }

    qb.push(match query.sort {
        ReviewSort::Newest => " ORDER BY r.created_at DESC, r.id DESC",
        ReviewSort::Oldest => " ORDER BY r.created_at ASC, r.id ASC",
        ReviewSort::RatingDesc => " ORDER BY r.rating DESC, r.created_at DESC, r.id DESC",
        ReviewSort::RatingAsc => " ORDER BY r.rating ASC, r.created_at DESC, r.id DESC",
    });
    qb.push(" LIMIT ");
    qb.push_bind(query.limit + 1);

    let mut rows = qb.build_query_as::<ReviewRow>().fetch_all(pool).await?;

    let next_cursor = if rows.len() as i64 > query.limit {
        rows.truncate(query.limit as usize);
        rows.last().map(|last| ReviewCursor::from_row(last).encode())
    } else {
        None
    };

    Ok((rows, next_cursor))
}

/// Rows strictly after `cursor` in `sort` order
fn push_after_cursor(qb: &mut QueryBuilder<'_, Sqlite>, sort: ReviewSort, cursor: &ReviewCursor) {
    match sort {
        ReviewSort::Newest => {
            qb.push(" AND ");
            push_older(qb, cursor);
        }
        ReviewSort::Oldest => {
            qb.push(" AND (r.created_at > ");
            qb.push_bind(cursor.created_at.clone());
            qb.push(" OR (r.created_at = ");
            qb.push_bind(cursor.created_at.clone());
            qb.push(" AND r.id > ");
            qb.push_bind(cursor.id.clone());
            qb.push("))");
        }
        ReviewSort::RatingDesc | ReviewSort::RatingAsc => {
            let past = if sort == ReviewSort::RatingDesc { "<" } else { ">" };
            qb.push(format!(" AND (r.rating {} ", past));
            qb.push_bind(cursor.rating);
            qb.push(" OR (r.rating = ");
            qb.push_bind(cursor.rating);
            qb.push(" AND ");
            push_older(qb, cursor);
            qb.push("))");
        }
    }
}

/// `(created_at, id)` strictly before the cursor
fn push_older(qb: &mut QueryBuilder<'_, Sqlite>, cursor: &ReviewCursor) {
    qb.push("(r.created_at < ");
    qb.push_bind(cursor.created_at.clone());
    qb.push(" OR (r.created_at = ");
    qb.push_bind(cursor.created_at.clone());
    qb.push(" AND r.id < ");
    qb.push_bind(cursor.id.clone());
    qb.push("))");
}

/// Read, adjust and store a personality's aggregate on an open transaction
async fn apply_aggregate(
    conn: &mut SqliteConnection,
    personality_id: &str,
    change: impl FnOnce(Aggregate) -> Aggregate,
) -> ApiResult<Aggregate> {
    let (total, average): (i64, f64) = sqlx::query_as(
        "SELECT total_reviews, average_review FROM personalities WHERE id = ?",
    )
    .bind(personality_id)
    .fetch_one(&mut *conn)
    .await?;

    let next = change(Aggregate::new(total, average));

    sqlx::query("UPDATE personalities SET total_reviews = ?, average_review = ? WHERE id = ?")
        .bind(next.total_reviews)
        .bind(next.average_review)
        .bind(personality_id)
        .execute(&mut *conn)
        .await?;

    Ok(next)
}

/// Insert a review, fold its rating into the aggregate, count it on the org
pub async fn create(
    pool: &SqlitePool,
    personality: &PersonalityRow,
    author: Uuid,
    payload: &ReviewCreate,
) -> ApiResult<Uuid> {
    let id = uuid_utils::generate();
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO reviews (id, personality_id, author_id, title, body, rating) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(&personality.id)
    .bind(author.to_string())
    .bind(payload.title.trim())
    .bind(payload.body.trim())
    .bind(payload.rating)
    .execute(&mut *tx)
    .await?;

    let aggregate =
        apply_aggregate(&mut tx, &personality.id, |agg| agg.with_added(payload.rating)).await?;

    sqlx::query("UPDATE organizations SET reviews_count = reviews_count + 1 WHERE id = ?")
        .bind(&personality.org_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    debug!(
        review_id = %id,
        personality_id = %personality.id,
        total_reviews = aggregate.total_reviews,
        average_review = aggregate.average_review,
        "Review created"
    );
    Ok(id)
}

/// Apply a partial update, adjusting the aggregate when the rating changes
///
/// The write is guarded by the rating last seen so that the aggregate is
/// always adjusted from the rating actually replaced.
pub async fn update(pool: &SqlitePool, existing: &ReviewRow, changes: &ReviewUpdate) -> ApiResult<()> {
    let mut seen_rating = existing.rating;

    for _ in 0..UPDATE_ATTEMPTS {
        let mut tx = pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE reviews SET \
                 title = COALESCE(?, title), \
                 body = COALESCE(?, body), \
                 rating = COALESCE(?, rating) \
             WHERE id = ? AND rating = ?",
        )
        .bind(changes.title.as_deref().map(str::trim))
        .bind(changes.body.as_deref().map(str::trim))
        .bind(changes.rating)
        .bind(&existing.id)
        .bind(seen_rating)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 1 {
            if let Some(new_rating) = changes.rating.filter(|r| *r != seen_rating) {
                apply_aggregate(&mut tx, &existing.personality_id, |agg| {
                    agg.with_changed(seen_rating, new_rating)
                })
                .await?;
            }
            tx.commit().await?;
            return Ok(());
        }

        drop(tx);
        let current: Option<i64> = sqlx::query_scalar("SELECT rating FROM reviews WHERE id = ?")
            .bind(&existing.id)
            .fetch_optional(pool)
            .await?;
        match current {
            Some(rating) => seen_rating = rating,
            None => return Err(ApiError::NotFound("Review not found".to_string())),
        }
    }

    warn!(review_id = %existing.id, "Review rating kept changing during update");
    Err(ApiError::Conflict(
        "Review was modified concurrently, please retry".to_string(),
    ))
}

/// Delete a review and take it out of the aggregates
pub async fn delete(pool: &SqlitePool, review_id: &str) -> ApiResult<()> {
    let mut tx = pool.begin().await?;

    let deleted: Option<(String, i64)> =
        sqlx::query_as("DELETE FROM reviews WHERE id = ? RETURNING personality_id, rating")
            .bind(review_id)
            .fetch_optional(&mut *tx)
            .await?;

    let (personality_id, rating) =
        deleted.ok_or_else(|| ApiError::NotFound("Review not found".to_string()))?;

    apply_aggregate(&mut tx, &personality_id, |agg| agg.with_removed(rating)).await?;

    sqlx::query(
        "UPDATE organizations SET reviews_count = MAX(reviews_count - 1, 0) \
         WHERE id = (SELECT org_id FROM personalities WHERE id = ?)",
    )
    .bind(&personality_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Full review representation with its personality summary
pub fn to_review_out(row: ReviewRow, personality: &PersonalityRow) -> ApiResult<ReviewOut> {
    Ok(ReviewOut {
        id: parse_column("reviews.id", &row.id)?,
        personality: PersonalitySummary::try_from(personality)?,
        author: row.author()?,
        created_at: parse_db("reviews.created_at", &row.created_at)?,
        updated_at: parse_db("reviews.updated_at", &row.updated_at)?,
        title: row.title,
        body: row.body,
        rating: row.rating,
    })
}
