//! Networked Postgres storage backend
//!
//! Selected when a connection string is configured. Implements the exact
//! query semantics of the embedded backend; only placeholder syntax and DDL
//! dialect differ.

use crate::error::Result;
use crate::storage::EvaluationStore;
use crate::types::{AggregateStats, EvaluationRecord, EvaluationResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info};

/// Numbered schema steps, applied in order at startup
///
/// Mirrors the SQLite chain: step 1 is the original pre-payload schema,
/// step 2 upgrades tables created by it in place.
const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        r#"
        CREATE TABLE IF NOT EXISTS evaluations (
            id BIGSERIAL PRIMARY KEY,
            alt_text TEXT NOT NULL,
            image_type TEXT,
            grade TEXT,
            reason TEXT,
            improvement TEXT,
            compliant BIGINT,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    ),
    (2, "ALTER TABLE evaluations ADD COLUMN image_data TEXT"),
];

/// Postgres storage backend
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to the server and bring the schema up to date
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to Postgres database");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Pool accessor, mainly for test setup
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply any schema migrations not yet recorded for this database
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version BIGINT PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let applied: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;

        for (version, sql) in MIGRATIONS {
            if *version <= applied {
                continue;
            }
            debug!("Applying schema migration {}", version);
            sqlx::query(sql).execute(&self.pool).await?;
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES ($1, $2)")
                .bind(*version)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    fn row_to_record(row: &PgRow) -> Result<EvaluationRecord> {
        Ok(EvaluationRecord {
            id: row.try_get("id")?,
            alt_text: row.try_get("alt_text")?,
            image_data: row.try_get("image_data")?,
            image_type: row.try_get("image_type")?,
            grade: row.try_get("grade")?,
            reason: row.try_get("reason")?,
            improvement: row.try_get("improvement")?,
            compliant: row.try_get("compliant")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl EvaluationStore for PostgresStore {
    async fn save(
        &self,
        alt_text: &str,
        result: &EvaluationResult,
        image_data: Option<&str>,
    ) -> Result<i64> {
        debug!("Inserting evaluation ({} grade)", result.grade);

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO evaluations
                (alt_text, image_data, image_type, grade, reason, improvement, compliant, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(alt_text)
        .bind(image_data)
        .bind(&result.image_type)
        .bind(&result.grade)
        .bind(&result.reason)
        .bind(&result.improvement)
        .bind(result.compliant)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn list_history(&self, limit: i64, offset: i64) -> Result<Vec<EvaluationRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM evaluations
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<EvaluationRecord>> {
        let row = sqlx::query("SELECT * FROM evaluations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn statistics(&self) -> Result<AggregateStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM evaluations")
            .fetch_one(&self.pool)
            .await?;

        let mut stats = AggregateStats {
            total_evaluations: total,
            ..Default::default()
        };

        let rows =
            sqlx::query("SELECT image_type, COUNT(*) AS count FROM evaluations GROUP BY image_type")
                .fetch_all(&self.pool)
                .await?;
        for row in rows {
            let bucket: Option<String> = row.try_get("image_type")?;
            stats
                .type_distribution
                .insert(bucket.unwrap_or_else(|| "null".to_string()), row.try_get("count")?);
        }

        let rows = sqlx::query("SELECT grade, COUNT(*) AS count FROM evaluations GROUP BY grade")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let bucket: Option<String> = row.try_get("grade")?;
            stats
                .grade_distribution
                .insert(bucket.unwrap_or_else(|| "null".to_string()), row.try_get("count")?);
        }

        let rows =
            sqlx::query("SELECT compliant, COUNT(*) AS count FROM evaluations GROUP BY compliant")
                .fetch_all(&self.pool)
                .await?;
        for row in rows {
            let bucket: Option<i64> = row.try_get("compliant")?;
            stats.compliant_distribution.insert(
                bucket.map(|c| c.to_string()).unwrap_or_else(|| "null".to_string()),
                row.try_get("count")?,
            );
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::contract;

    #[tokio::test]
    #[ignore] // Requires THEMIS_TEST_DATABASE_URL pointing at a disposable Postgres database
    async fn test_postgres_store_contract() {
        let url = std::env::var("THEMIS_TEST_DATABASE_URL")
            .expect("THEMIS_TEST_DATABASE_URL must point at a disposable database");
        let store = PostgresStore::connect(&url).await.unwrap();

        sqlx::query("TRUNCATE evaluations RESTART IDENTITY")
            .execute(store.pool())
            .await
            .unwrap();

        contract::exercise(&store).await;
    }
}
