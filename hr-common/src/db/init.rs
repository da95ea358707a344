//! Database initialization
//!
//! Opens (or creates) the SQLite database, applies connection pragmas and
//! creates every table, index and `updated_at` trigger. Table creation uses
//! `CREATE ... IF NOT EXISTS` so it is safe on every startup; structural
//! changes to existing databases are handled by [`crate::db::migrations`].

use crate::time::SQL_NOW;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Tables that carry an `updated_at` column maintained by trigger
pub const TRACKED_TABLES: &[&str] = &[
    "profiles",
    "organizations",
    "org_memberships",
    "personalities",
    "reviews",
    "user_sessions",
    "recovery_codes",
];

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas are set through connect options so that every pooled
    // connection gets them, not only the first one
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    // Structural and data migrations for databases created by older builds
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create all tables, indexes and triggers (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_profiles_table(pool).await?;
    create_organizations_table(pool).await?;
    create_org_memberships_table(pool).await?;
    create_personalities_table(pool).await?;
    create_reviews_table(pool).await?;
    create_user_sessions_table(pool).await?;
    create_recovery_codes_table(pool).await?;

    for table in TRACKED_TABLES {
        create_updated_at_trigger(pool, table).await?;
    }

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL COLLATE NOCASE UNIQUE,
            display_name TEXT,
            bio TEXT,
            avatar_url TEXT,
            password_hash TEXT,
            auth_uid TEXT UNIQUE,
            created_at TEXT NOT NULL DEFAULT ({now}),
            updated_at TEXT NOT NULL DEFAULT ({now})
        )
        "#,
        now = SQL_NOW
    ))
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_organizations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT,
            created_by TEXT REFERENCES profiles(id) ON DELETE SET NULL,
            members_count INTEGER NOT NULL DEFAULT 0,
            personalities_count INTEGER NOT NULL DEFAULT 0,
            reviews_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT ({now}),
            updated_at TEXT NOT NULL DEFAULT ({now})
        )
        "#,
        now = SQL_NOW
    ))
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_organizations_created_at ON organizations(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Memberships; at most one creator per organization
async fn create_org_memberships_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS org_memberships (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            member_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            role TEXT NOT NULL DEFAULT 'member'
                CHECK (role IN ('creator', 'moderator', 'member')),
            joined_at TEXT NOT NULL DEFAULT ({now}),
            updated_at TEXT NOT NULL DEFAULT ({now}),
            UNIQUE (org_id, member_id)
        )
        "#,
        now = SQL_NOW
    ))
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_org_memberships_one_creator \
         ON org_memberships(org_id) WHERE role = 'creator'",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_org_memberships_member ON org_memberships(member_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_personalities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS personalities (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            description TEXT,
            created_by TEXT REFERENCES profiles(id) ON DELETE SET NULL,
            total_reviews INTEGER NOT NULL DEFAULT 0,
            average_review REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT ({now}),
            updated_at TEXT NOT NULL DEFAULT ({now}),
            UNIQUE (org_id, slug)
        )
        "#,
        now = SQL_NOW
    ))
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_personalities_org_name \
         ON personalities(org_id, name COLLATE NOCASE)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Reviews table definition, parameterized by name so that the rating
/// migration can rebuild legacy tables with the same constraints
pub fn reviews_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            personality_id TEXT NOT NULL REFERENCES personalities(id) ON DELETE CASCADE,
            author_id TEXT REFERENCES profiles(id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            created_at TEXT NOT NULL DEFAULT ({now}),
            updated_at TEXT NOT NULL DEFAULT ({now})
        )
        "#,
        table = table,
        now = SQL_NOW
    )
}

async fn create_reviews_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&reviews_table_sql("reviews"))
        .execute(pool)
        .await?;

    create_review_indexes(pool).await
}

/// Keyset pagination indexes for the review list sorts
pub async fn create_review_indexes(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_reviews_personality_created \
         ON reviews(personality_id, created_at, id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_reviews_personality_rating \
         ON reviews(personality_id, rating, created_at, id)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reviews_author ON reviews(author_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_user_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS user_sessions (
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            refresh_token_hash TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT ({now}),
            last_used_at TEXT NOT NULL DEFAULT ({now}),
            expires_at TEXT NOT NULL,
            revoked INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT ({now})
        )
        "#,
        now = SQL_NOW
    ))
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_sessions_profile ON user_sessions(profile_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_recovery_codes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS recovery_codes (
            id TEXT PRIMARY KEY,
            profile_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            code_hash TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT ({now}),
            consumed_at TEXT,
            expires_at TEXT,
            updated_at TEXT NOT NULL DEFAULT ({now})
        )
        "#,
        now = SQL_NOW
    ))
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_recovery_codes_hash ON recovery_codes(code_hash)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_recovery_codes_profile ON recovery_codes(profile_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Touch `updated_at` whenever a row changes without setting it explicitly
///
/// The WHEN guard stops the trigger's own UPDATE from firing it again.
pub async fn create_updated_at_trigger(pool: &SqlitePool, table: &str) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_{table}_updated_at
        AFTER UPDATE ON {table}
        FOR EACH ROW WHEN NEW.updated_at = OLD.updated_at
        BEGIN
            UPDATE {table} SET updated_at = {now} WHERE id = NEW.id;
        END
        "#,
        table = table,
        now = SQL_NOW
    ))
    .execute(pool)
    .await?;

    Ok(())
}
