//! Profile queries

use hr_common::api::requests::ProfileUpdate;
use hr_common::db::ProfileRow;
use hr_common::uuid_utils;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{is_unique_violation, ApiError, ApiResult};

const PROFILE_COLUMNS: &str =
    "id, username, display_name, bio, avatar_url, password_hash, created_at, updated_at";

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> ApiResult<Option<ProfileRow>> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {} FROM profiles WHERE id = ?",
        PROFILE_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Case-insensitive (the column is `COLLATE NOCASE`)
pub async fn find_by_username(pool: &SqlitePool, username: &str) -> ApiResult<Option<ProfileRow>> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {} FROM profiles WHERE username = ?",
        PROFILE_COLUMNS
    ))
    .bind(username.trim())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Insert a profile and its hashed recovery codes in one transaction
pub async fn create_with_recovery_codes(
    pool: &SqlitePool,
    username: &str,
    display_name: Option<&str>,
    password_hash: &str,
    code_hashes: &[String],
    codes_expire_at: &str,
) -> ApiResult<ProfileRow> {
    let mut tx = pool.begin().await?;
    let id = uuid_utils::generate().to_string();

    let inserted = sqlx::query_as::<_, ProfileRow>(&format!(
        "INSERT INTO profiles (id, username, display_name, password_hash) \
         VALUES (?, ?, ?, ?) RETURNING {}",
        PROFILE_COLUMNS
    ))
    .bind(&id)
    .bind(username.trim())
    .bind(display_name.map(str::trim))
    .bind(password_hash)
    .fetch_one(&mut *tx)
    .await;

    let profile = match inserted {
        Ok(row) => row,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::BadRequest("Username already exists".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    for hash in code_hashes {
        sqlx::query(
            "INSERT INTO recovery_codes (id, profile_id, code_hash, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid_utils::generate().to_string())
        .bind(&id)
        .bind(hash)
        .bind(codes_expire_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(profile)
}

/// Apply a partial update; absent fields keep their value
pub async fn update(pool: &SqlitePool, id: Uuid, changes: &ProfileUpdate) -> ApiResult<ProfileRow> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "UPDATE profiles SET \
             display_name = COALESCE(?, display_name), \
             bio = COALESCE(?, bio), \
             avatar_url = COALESCE(?, avatar_url) \
         WHERE id = ? RETURNING {}",
        PROFILE_COLUMNS
    ))
    .bind(changes.display_name.as_deref())
    .bind(changes.bio.as_deref())
    .bind(changes.avatar_url.as_deref())
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))
}
