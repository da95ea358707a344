//! Database schema migrations
//!
//! Versioned migrations bring databases written by older builds up to the
//! current schema without data loss. Progress is tracked in the
//! `schema_version` table and every migration is idempotent.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field depend on them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Check before changing** - a migration must be a no-op on a current schema
//! 4. **Prefer ALTER TABLE** - rebuild a table only when SQLite cannot alter it

use crate::db::{backfill, init};
use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    if !table_exists(pool, "schema_version").await? {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
    )
    .bind(table)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: Constrain review ratings to 1-5
///
/// **Background:** Early databases stored ratings on a 0-100 scale in a
/// nullable column with no CHECK. SQLite cannot add a CHECK constraint to an
/// existing table, so the table is rebuilt. Out-of-range values are clamped
/// into [1, 5] (missing ratings become 1), never dropped, and the
/// personality/organization aggregates are recomputed afterwards.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: Constrain review ratings to 1-5");

    if !table_exists(pool, "reviews").await? {
        info!("  Reviews table doesn't exist yet - skipping migration");
        return Ok(());
    }

    let table_sql: String = sqlx::query_scalar(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'reviews'",
    )
    .fetch_one(pool)
    .await?;

    if table_sql.contains("BETWEEN 1 AND 5") {
        info!("  Rating constraint already present - skipping");
        return Ok(());
    }

    let out_of_range: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reviews WHERE rating IS NULL OR rating NOT BETWEEN 1 AND 5",
    )
    .fetch_one(pool)
    .await?;

    // Foreign key enforcement must be off while the table is swapped, and the
    // pragma is per connection, so the whole rebuild runs on one connection
    let mut conn = pool.acquire().await?;
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&mut *conn)
        .await?;

    let rebuilt = rebuild_reviews_table(&mut conn).await;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;
    drop(conn);
    rebuilt?;

    // Indexes and the trigger went away with the old table
    init::create_review_indexes(pool).await?;
    init::create_updated_at_trigger(pool, "reviews").await?;

    info!("  ✓ Rebuilt reviews table ({} ratings clamped)", out_of_range);

    if out_of_range > 0 {
        let report = backfill::recompute_aggregates(pool).await?;
        info!(
            "  ✓ Recomputed aggregates ({} personalities, {} organizations corrected)",
            report.personalities_fixed, report.organizations_fixed
        );
    }

    Ok(())
}

async fn rebuild_reviews_table(conn: &mut sqlx::SqliteConnection) -> Result<()> {
    let mut tx = sqlx::Connection::begin(conn).await?;

    sqlx::query(&init::reviews_table_sql("reviews_rebuild"))
        .execute(&mut *tx)
        .await?;

    sqlx::query(&format!(
        r#"
        INSERT INTO reviews_rebuild
            (id, personality_id, author_id, title, body, rating, created_at, updated_at)
        SELECT
            id, personality_id, author_id, title, body,
            MIN(5, MAX(1, COALESCE(rating, 1))),
            COALESCE(created_at, {now}),
            COALESCE(updated_at, {now})
        FROM reviews
        "#,
        now = crate::time::SQL_NOW
    ))
    .execute(&mut *tx)
    .await?;

    sqlx::query("DROP TABLE reviews").execute(&mut *tx).await?;
    sqlx::query("ALTER TABLE reviews_rebuild RENAME TO reviews")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Migration v2: Add auth_uid column to profiles
///
/// **Background:** Profiles created before external identity linking have
/// no `auth_uid`. SQLite cannot add a UNIQUE column, so uniqueness comes
/// from a separate index.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: Add auth_uid column to profiles");

    if !table_exists(pool, "profiles").await? {
        info!("  Profiles table doesn't exist yet - skipping migration");
        return Ok(());
    }

    if column_exists(pool, "profiles", "auth_uid").await? {
        info!("  auth_uid column already exists - skipping");
        return Ok(());
    }

    match sqlx::query("ALTER TABLE profiles ADD COLUMN auth_uid TEXT")
        .execute(pool)
        .await
    {
        Ok(_) => info!("  ✓ Added auth_uid column to profiles table"),
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            info!("  auth_uid column added by concurrent startup - skipping");
        }
        Err(e) => return Err(e.into()),
    }

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_profiles_auth_uid ON profiles(auth_uid)")
        .execute(pool)
        .await?;

    Ok(())
}
