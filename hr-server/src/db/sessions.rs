//! Refresh-token sessions and recovery codes
//!
//! Only HMACs of the raw secrets are stored; every lookup is by hash.

use hr_common::time::{now_db, SQL_NOW};
use hr_common::uuid_utils;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::ApiResult;

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub profile_id: String,
    pub expires_at: String,
    pub revoked: bool,
}

impl SessionRow {
    pub fn is_expired(&self) -> bool {
        self.expires_at < now_db()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RecoveryCodeRow {
    pub id: String,
    pub profile_id: String,
    pub expires_at: Option<String>,
}

impl RecoveryCodeRow {
    pub fn is_expired(&self) -> bool {
        self.expires_at.as_deref().is_some_and(|at| at < now_db().as_str())
    }
}

pub async fn create(
    pool: &SqlitePool,
    profile_id: Uuid,
    token_hash: &str,
    expires_at: &str,
) -> ApiResult<()> {
    sqlx::query(
        "INSERT INTO user_sessions (id, profile_id, refresh_token_hash, expires_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(uuid_utils::generate().to_string())
    .bind(profile_id.to_string())
    .bind(token_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Unrevoked session for a refresh-token hash
pub async fn find_active(pool: &SqlitePool, token_hash: &str) -> ApiResult<Option<SessionRow>> {
    let row = sqlx::query_as::<_, SessionRow>(
        "SELECT id, profile_id, expires_at, revoked FROM user_sessions \
         WHERE refresh_token_hash = ? AND revoked = 0",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Replace the token hash and extend the session
///
/// Guarded by the presented hash so that two concurrent refreshes with the
/// same token cannot both win; returns `false` for the loser.
pub async fn rotate(
    pool: &SqlitePool,
    session_id: &str,
    old_hash: &str,
    new_hash: &str,
    expires_at: &str,
) -> ApiResult<bool> {
    let result = sqlx::query(&format!(
        "UPDATE user_sessions \
         SET refresh_token_hash = ?, expires_at = ?, last_used_at = {now} \
         WHERE id = ? AND refresh_token_hash = ? AND revoked = 0",
        now = SQL_NOW
    ))
    .bind(new_hash)
    .bind(expires_at)
    .bind(session_id)
    .bind(old_hash)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Revoke by token hash; unknown tokens are ignored
pub async fn revoke(pool: &SqlitePool, token_hash: &str) -> ApiResult<()> {
    sqlx::query("UPDATE user_sessions SET revoked = 1 WHERE refresh_token_hash = ? AND revoked = 0")
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(())
}

/// Unconsumed recovery code by hash
pub async fn find_recovery_code(
    pool: &SqlitePool,
    code_hash: &str,
) -> ApiResult<Option<RecoveryCodeRow>> {
    let row = sqlx::query_as::<_, RecoveryCodeRow>(
        "SELECT id, profile_id, expires_at FROM recovery_codes \
         WHERE code_hash = ? AND consumed_at IS NULL",
    )
    .bind(code_hash)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Consume a recovery code, set the new password and revoke all sessions
///
/// Returns `false` when the code was consumed concurrently.
pub async fn redeem_recovery_code(
    pool: &SqlitePool,
    code: &RecoveryCodeRow,
    password_hash: &str,
) -> ApiResult<bool> {
    let mut tx = pool.begin().await?;

    let consumed = sqlx::query(&format!(
        "UPDATE recovery_codes SET consumed_at = {now} WHERE id = ? AND consumed_at IS NULL",
        now = SQL_NOW
    ))
    .bind(&code.id)
    .execute(&mut *tx)
    .await?;
    if consumed.rows_affected() != 1 {
        return Ok(false);
    }

    sqlx::query("UPDATE profiles SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(&code.profile_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE user_sessions SET revoked = 1 WHERE profile_id = ? AND revoked = 0")
        .bind(&code.profile_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}
