//! Organization and membership queries

use hr_common::api::query::{MemberSort, OrgSort, SortField};
use hr_common::api::requests::{OrgCreate, OrgUpdate};
use hr_common::api::types::MemberRole;
use hr_common::db::{MemberRow, OrgRow};
use hr_common::uuid_utils;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::pagination::{like_pattern, ResolvedList};
use crate::slug::{candidate, MAX_SLUG_ATTEMPTS};

const ORG_COLUMNS: &str = "o.id AS id, o.slug AS slug, o.name AS name, \
     o.description AS description, o.created_by AS created_by, \
     o.members_count AS members_count, o.personalities_count AS personalities_count, \
     o.reviews_count AS reviews_count, o.created_at AS created_at, o.updated_at AS updated_at";

/// Organization plus the caller's role in it (if any)
#[derive(Debug, Clone, FromRow)]
pub struct OrgWithRoleRow {
    #[sqlx(flatten)]
    pub org: OrgRow,
    pub member_role: Option<String>,
}

/// Outcome of a promotion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    Promoted,
    AlreadyModerator,
    IsCreator,
    NotMember,
}

pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> ApiResult<Option<OrgRow>> {
    let row = sqlx::query_as::<_, OrgRow>(&format!(
        "SELECT {} FROM organizations o WHERE o.slug = ?",
        ORG_COLUMNS
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Like [`find_by_slug`] but 404s when missing
pub async fn require_by_slug(pool: &SqlitePool, slug: &str) -> ApiResult<OrgRow> {
    find_by_slug(pool, slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))
}

fn push_name_search(qb: &mut QueryBuilder<'_, Sqlite>, search: &Option<String>) {
    if let Some(search) = search {
        qb.push(" AND o.name LIKE ");
        qb.push_bind(like_pattern(search));
        qb.push(" ESCAPE '\\'");
    }
}

/// ORDER BY plus LIMIT/OFFSET
pub(crate) fn push_window<S: SortField>(
    qb: &mut QueryBuilder<'_, Sqlite>,
    list: &ResolvedList<S>,
    id_column: &str,
) {
    qb.push(" ORDER BY ");
    qb.push(list.order_by(id_column));
    qb.push(" LIMIT ");
    qb.push_bind(list.window.limit);
    qb.push(" OFFSET ");
    qb.push_bind(list.window.offset);
}

/// Page of organizations; search matches the name case-insensitively
pub async fn list(pool: &SqlitePool, list: &ResolvedList<OrgSort>) -> ApiResult<Vec<OrgRow>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM organizations o WHERE 1=1",
        ORG_COLUMNS
    ));
    push_name_search(&mut qb, &list.search);
    push_window(&mut qb, list, "o.id");

    let rows = qb.build_query_as::<OrgRow>().fetch_all(pool).await?;
    Ok(rows)
}

/// Page of organizations annotated with `profile_id`'s membership
pub async fn list_with_membership(
    pool: &SqlitePool,
    profile_id: Uuid,
    list: &ResolvedList<OrgSort>,
) -> ApiResult<Vec<OrgWithRoleRow>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {}, m.role AS member_role FROM organizations o \
         LEFT JOIN org_memberships m ON m.org_id = o.id AND m.member_id = ",
        ORG_COLUMNS
    ));
    qb.push_bind(profile_id.to_string());
    qb.push(" WHERE 1=1");
    push_name_search(&mut qb, &list.search);
    push_window(&mut qb, list, "o.id");

    let rows = qb.build_query_as::<OrgWithRoleRow>().fetch_all(pool).await?;
    Ok(rows)
}

/// Create an organization with `creator` as its first member
///
/// Slug collisions retry with `-2`, `-3`, ... suffixes. Each attempt is its
/// own transaction so a lost race on the slug leaves nothing behind.
pub async fn create(
    pool: &SqlitePool,
    creator: Uuid,
    payload: &OrgCreate,
    base_slug: &str,
) -> ApiResult<OrgRow> {
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let slug = candidate(base_slug, attempt);
        let id = uuid_utils::generate().to_string();
        let mut tx = pool.begin().await?;

        let inserted = sqlx::query_as::<_, OrgRow>(
            "INSERT INTO organizations (id, slug, name, description, created_by, members_count) \
             VALUES (?, ?, ?, ?, ?, 1) \
             RETURNING id, slug, name, description, created_by, members_count, \
                       personalities_count, reviews_count, created_at, updated_at",
        )
        .bind(&id)
        .bind(&slug)
        .bind(payload.name.trim())
        .bind(payload.description.as_deref().map(str::trim))
        .bind(creator.to_string())
        .fetch_one(&mut *tx)
        .await;

        let org = match inserted {
            Ok(org) => org,
            Err(e) if is_unique_violation(&e) => {
                debug!(slug = %slug, "Organization slug taken, trying next");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        sqlx::query(
            "INSERT INTO org_memberships (id, org_id, member_id, role) VALUES (?, ?, ?, 'creator')",
        )
        .bind(uuid_utils::generate().to_string())
        .bind(&id)
        .bind(creator.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        return Ok(org);
    }

    Err(ApiError::Internal(
        "Unable to generate unique slug for organization".to_string(),
    ))
}

/// Partial update; the slug never changes
pub async fn update(pool: &SqlitePool, org_id: &str, changes: &OrgUpdate) -> ApiResult<OrgRow> {
    let row = sqlx::query_as::<_, OrgRow>(
        "UPDATE organizations SET \
             name = COALESCE(?, name), \
             description = COALESCE(?, description) \
         WHERE id = ? \
         RETURNING id, slug, name, description, created_by, members_count, \
                   personalities_count, reviews_count, created_at, updated_at",
    )
    .bind(changes.name.as_deref().map(str::trim))
    .bind(changes.description.as_deref().map(str::trim))
    .bind(org_id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))
}

/// Delete an organization; memberships, personalities and reviews cascade
pub async fn delete(pool: &SqlitePool, org_id: &str) -> ApiResult<()> {
    sqlx::query("DELETE FROM organizations WHERE id = ?")
        .bind(org_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn role_of(
    pool: &SqlitePool,
    org_id: &str,
    profile_id: Uuid,
) -> ApiResult<Option<MemberRole>> {
    let role: Option<String> =
        sqlx::query_scalar("SELECT role FROM org_memberships WHERE org_id = ? AND member_id = ?")
            .bind(org_id)
            .bind(profile_id.to_string())
            .fetch_optional(pool)
            .await?;

    Ok(role.map(|r| r.parse::<MemberRole>()).transpose()?)
}

/// Add a plain membership; `false` when already a member
pub async fn join(pool: &SqlitePool, org_id: &str, profile_id: Uuid) -> ApiResult<bool> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO org_memberships (id, org_id, member_id, role) \
         VALUES (?, ?, ?, 'member')",
    )
    .bind(uuid_utils::generate().to_string())
    .bind(org_id)
    .bind(profile_id.to_string())
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query("UPDATE organizations SET members_count = members_count + 1 WHERE id = ?")
        .bind(org_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

/// Raise a plain member to moderator
pub async fn promote(pool: &SqlitePool, org_id: &str, member_id: Uuid) -> ApiResult<Promotion> {
    let updated = sqlx::query(
        "UPDATE org_memberships SET role = 'moderator' \
         WHERE org_id = ? AND member_id = ? AND role = 'member'",
    )
    .bind(org_id)
    .bind(member_id.to_string())
    .execute(pool)
    .await?;

    if updated.rows_affected() == 1 {
        return Ok(Promotion::Promoted);
    }

    Ok(match role_of(pool, org_id, member_id).await? {
        Some(MemberRole::Creator) => Promotion::IsCreator,
        Some(_) => Promotion::AlreadyModerator,
        None => Promotion::NotMember,
    })
}

/// Page of members; search matches username or display name
pub async fn list_members(
    pool: &SqlitePool,
    org_id: &str,
    list: &ResolvedList<MemberSort>,
) -> ApiResult<Vec<MemberRow>> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT m.member_id AS member_id, m.role AS role, m.joined_at AS joined_at, \
                pr.username AS username, pr.display_name AS display_name, \
                pr.avatar_url AS avatar_url \
         FROM org_memberships m JOIN profiles pr ON pr.id = m.member_id \
         WHERE m.org_id = ",
    );
    qb.push_bind(org_id.to_string());

    if let Some(search) = &list.search {
        let pattern = like_pattern(search);
        qb.push(" AND (pr.username LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR pr.display_name LIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\')");
    }
    push_window(&mut qb, list, "m.id");

    let rows = qb.build_query_as::<MemberRow>().fetch_all(pool).await?;
    Ok(rows)
}
