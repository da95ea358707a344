//! Database initialization and schema constraint tests

use hr_common::db::init::init_database;
use hr_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn fresh_db() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("nested").join("honest.db"))
        .await
        .unwrap();
    (dir, pool)
}

async fn exec(pool: &SqlitePool, sql: &str) -> Result<(), sqlx::Error> {
    sqlx::query(sql).execute(pool).await.map(|_| ())
}

async fn seed_org(pool: &SqlitePool) {
    exec(pool, "INSERT INTO profiles (id, username) VALUES ('u1', 'alice'), ('u2', 'bob')")
        .await
        .unwrap();
    exec(pool, "INSERT INTO organizations (id, slug, name, created_by) VALUES ('o1', 'acme', 'Acme', 'u1')")
        .await
        .unwrap();
    exec(pool, "INSERT INTO org_memberships (id, org_id, member_id, role) VALUES ('m1', 'o1', 'u1', 'creator')")
        .await
        .unwrap();
    exec(pool, "INSERT INTO personalities (id, org_id, name, slug) VALUES ('p1', 'o1', 'Pat', 'pat')")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_database_created_with_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("a").join("b").join("honest.db");

    let pool = init_database(&db_path).await.unwrap();

    assert!(db_path.exists(), "Database file was not created");
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("honest.db");

    let first = init_database(&db_path).await.unwrap();
    exec(&first, "INSERT INTO profiles (id, username) VALUES ('u1', 'alice')")
        .await
        .unwrap();
    first.close().await;

    let second = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
        .fetch_one(&second)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_rating_check_constraint() {
    let (_dir, pool) = fresh_db().await;
    seed_org(&pool).await;

    for rating in [0, 6] {
        let result = exec(
            &pool,
            &format!(
                "INSERT INTO reviews (id, personality_id, title, body, rating) VALUES ('r{0}', 'p1', 't', 'b', {0})",
                rating
            ),
        )
        .await;
        assert!(result.is_err(), "rating {} should be rejected", rating);
    }

    exec(&pool, "INSERT INTO reviews (id, personality_id, title, body, rating) VALUES ('ok', 'p1', 't', 'b', 5)")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_single_creator_per_org() {
    let (_dir, pool) = fresh_db().await;
    seed_org(&pool).await;

    let second_creator = exec(
        &pool,
        "INSERT INTO org_memberships (id, org_id, member_id, role) VALUES ('m2', 'o1', 'u2', 'creator')",
    )
    .await;
    assert!(second_creator.is_err());

    exec(
        &pool,
        "INSERT INTO org_memberships (id, org_id, member_id, role) VALUES ('m2', 'o1', 'u2', 'moderator')",
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_role_check_constraint() {
    let (_dir, pool) = fresh_db().await;
    seed_org(&pool).await;

    let result = exec(
        &pool,
        "INSERT INTO org_memberships (id, org_id, member_id, role) VALUES ('m2', 'o1', 'u2', 'owner')",
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_case_insensitive_uniques() {
    let (_dir, pool) = fresh_db().await;
    seed_org(&pool).await;

    assert!(exec(&pool, "INSERT INTO profiles (id, username) VALUES ('u3', 'ALICE')")
        .await
        .is_err());
    assert!(exec(
        &pool,
        "INSERT INTO personalities (id, org_id, name, slug) VALUES ('p2', 'o1', 'PAT', 'pat-2')"
    )
    .await
    .is_err());
}

#[tokio::test]
async fn test_org_delete_cascades() {
    let (_dir, pool) = fresh_db().await;
    seed_org(&pool).await;
    exec(&pool, "INSERT INTO reviews (id, personality_id, author_id, title, body, rating) VALUES ('r1', 'p1', 'u1', 't', 'b', 4)")
        .await
        .unwrap();

    exec(&pool, "DELETE FROM organizations WHERE id = 'o1'").await.unwrap();

    for table in ["org_memberships", "personalities", "reviews"] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0, "{} rows should cascade", table);
    }
}

#[tokio::test]
async fn test_author_delete_keeps_review() {
    let (_dir, pool) = fresh_db().await;
    seed_org(&pool).await;
    exec(&pool, "INSERT INTO reviews (id, personality_id, author_id, title, body, rating) VALUES ('r1', 'p1', 'u2', 't', 'b', 4)")
        .await
        .unwrap();

    exec(&pool, "DELETE FROM profiles WHERE id = 'u2'").await.unwrap();

    let author: Option<String> = sqlx::query_scalar("SELECT author_id FROM reviews WHERE id = 'r1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(author.is_none());
}

#[tokio::test]
async fn test_updated_at_trigger() {
    let (_dir, pool) = fresh_db().await;
    seed_org(&pool).await;
    exec(&pool, "UPDATE organizations SET updated_at = '2000-01-01T00:00:00.000Z' WHERE id = 'o1'")
        .await
        .unwrap();

    exec(&pool, "UPDATE organizations SET name = 'Acme Inc' WHERE id = 'o1'")
        .await
        .unwrap();

    let updated_at: String = sqlx::query_scalar("SELECT updated_at FROM organizations WHERE id = 'o1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(updated_at.as_str() > "2000-01-01T00:00:00.000Z");
    assert!(updated_at.ends_with('Z'));
}
