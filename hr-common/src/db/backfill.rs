//! Aggregate backfill
//!
//! Recomputes every denormalized counter from the underlying rows. The API
//! keeps aggregates current inside each mutation transaction; this is the
//! repair path when they drift (legacy data, manual edits, interrupted
//! writers). Only rows whose stored values differ are rewritten.

use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Number of rows corrected by a backfill run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub personalities_fixed: u64,
    pub organizations_fixed: u64,
}

const PERSONALITY_TRUTH: &str = r#"
    SELECT p.id AS id,
           COUNT(r.id) AS total,
           COALESCE(ROUND(AVG(r.rating), 2), 0.0) AS average
    FROM personalities p
    LEFT JOIN reviews r ON r.personality_id = p.id
    GROUP BY p.id
"#;

const ORGANIZATION_TRUTH: &str = r#"
    SELECT o.id AS id,
           (SELECT COUNT(*) FROM org_memberships m WHERE m.org_id = o.id) AS members,
           (SELECT COUNT(*) FROM personalities p WHERE p.org_id = o.id) AS personalities,
           (SELECT COUNT(*) FROM reviews r
              JOIN personalities p ON p.id = r.personality_id
             WHERE p.org_id = o.id) AS reviews
    FROM organizations o
"#;

/// Recompute personality and organization aggregates in one transaction
pub async fn recompute_aggregates(pool: &SqlitePool) -> Result<BackfillReport> {
    let mut tx = pool.begin().await?;

    let personalities = sqlx::query(&format!(
        r#"
        WITH truth AS ({truth})
        UPDATE personalities
        SET total_reviews = (SELECT total FROM truth WHERE truth.id = personalities.id),
            average_review = (SELECT average FROM truth WHERE truth.id = personalities.id)
        WHERE EXISTS (
            SELECT 1 FROM truth
            WHERE truth.id = personalities.id
              AND (truth.total != personalities.total_reviews
                   OR ABS(truth.average - personalities.average_review) > 0.000001)
        )
        "#,
        truth = PERSONALITY_TRUTH
    ))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let organizations = sqlx::query(&format!(
        r#"
        WITH truth AS ({truth})
        UPDATE organizations
        SET members_count = (SELECT members FROM truth WHERE truth.id = organizations.id),
            personalities_count = (SELECT personalities FROM truth WHERE truth.id = organizations.id),
            reviews_count = (SELECT reviews FROM truth WHERE truth.id = organizations.id)
        WHERE EXISTS (
            SELECT 1 FROM truth
            WHERE truth.id = organizations.id
              AND (truth.members != organizations.members_count
                   OR truth.personalities != organizations.personalities_count
                   OR truth.reviews != organizations.reviews_count)
        )
        "#,
        truth = ORGANIZATION_TRUTH
    ))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    let report = BackfillReport {
        personalities_fixed: personalities,
        organizations_fixed: organizations,
    };
    info!(
        personalities = report.personalities_fixed,
        organizations = report.organizations_fixed,
        "Aggregate backfill complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::create_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();

        for sql in [
            "INSERT INTO profiles (id, username) VALUES ('u1', 'alice'), ('u2', 'bob')",
            "INSERT INTO organizations (id, slug, name, members_count) VALUES ('o1', 'acme', 'Acme', 99)",
            "INSERT INTO org_memberships (id, org_id, member_id, role) VALUES \
             ('m1', 'o1', 'u1', 'creator'), ('m2', 'o1', 'u2', 'member')",
            "INSERT INTO personalities (id, org_id, name, slug, total_reviews, average_review) VALUES \
             ('p1', 'o1', 'Pat', 'pat', 0, 0), ('p2', 'o1', 'Sam', 'sam', 0, 0)",
            "INSERT INTO reviews (id, personality_id, author_id, title, body, rating) VALUES \
             ('r1', 'p1', 'u1', 't', 'b', 5), ('r2', 'p1', 'u2', 't', 'b', 4), \
             ('r3', 'p1', 'u2', 't', 'b', 4)",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_recompute_fixes_drift() {
        let pool = seeded_pool().await;

        let report = recompute_aggregates(&pool).await.unwrap();
        assert_eq!(report.personalities_fixed, 1);
        assert_eq!(report.organizations_fixed, 1);

        let (total, avg): (i64, f64) =
            sqlx::query_as("SELECT total_reviews, average_review FROM personalities WHERE id = 'p1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(total, 3);
        assert_eq!(avg, 4.33);

        let counts: (i64, i64, i64) = sqlx::query_as(
            "SELECT members_count, personalities_count, reviews_count FROM organizations WHERE id = 'o1'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(counts, (2, 2, 3));
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let pool = seeded_pool().await;
        recompute_aggregates(&pool).await.unwrap();

        let second = recompute_aggregates(&pool).await.unwrap();
        assert_eq!(second, BackfillReport::default());
    }
}
