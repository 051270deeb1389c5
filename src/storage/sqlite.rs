//! Embedded SQLite storage backend
//!
//! Default backend: a single database file created on first start. Writers
//! are serialized by SQLite itself; a generous busy timeout covers concurrent
//! request bursts.

use crate::error::Result;
use crate::storage::EvaluationStore;
use crate::types::{AggregateStats, EvaluationRecord, EvaluationResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Numbered schema steps, applied in order at startup
///
/// Step 1 is the original pre-payload schema; step 2 upgrades tables created
/// by it in place. The chain replaces per-launch column introspection with a
/// one-time versioned migration.
const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        r#"
        CREATE TABLE IF NOT EXISTS evaluations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            alt_text TEXT NOT NULL,
            image_type TEXT,
            grade TEXT,
            reason TEXT,
            improvement TEXT,
            compliant INTEGER,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    ),
    (2, "ALTER TABLE evaluations ADD COLUMN image_data TEXT"),
];

/// SQLite storage backend
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database file, creating it if missing, and bring its schema
    /// up to date
    ///
    /// Accepts either a plain file path or a full `sqlite:` URL.
    pub async fn open(path: &str) -> Result<Self> {
        info!("Connecting to SQLite database: {}", path);

        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite://{}", path)
        };

        let options = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePool::connect_with(options).await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Apply any schema migrations not yet recorded for this database
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TIMESTAMP NOT NULL
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
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(*version)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    fn row_to_record(row: &SqliteRow) -> Result<EvaluationRecord> {
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
impl EvaluationStore for SqliteStore {
    async fn save(
        &self,
        alt_text: &str,
        result: &EvaluationResult,
        image_data: Option<&str>,
    ) -> Result<i64> {
        debug!("Inserting evaluation ({} grade)", result.grade);

        let outcome = sqlx::query(
            r#"
            INSERT INTO evaluations
                (alt_text, image_data, image_type, grade, reason, improvement, compliant, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
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
        .execute(&self.pool)
        .await?;

        Ok(outcome.last_insert_rowid())
    }

    async fn list_history(&self, limit: i64, offset: i64) -> Result<Vec<EvaluationRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM evaluations
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<EvaluationRecord>> {
        let row = sqlx::query("SELECT * FROM evaluations WHERE id = ?")
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
    use crate::types::EvaluationResult;
    use tempfile::TempDir;

    fn sample_result() -> EvaluationResult {
        EvaluationResult {
            image_type: "informational".to_string(),
            grade: "somewhat-high".to_string(),
            reason: "covers the headline".to_string(),
            improvement: "add the event date".to_string(),
            compliant: 1,
        }
    }

    #[tokio::test]
    async fn test_sqlite_store_contract() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evaluations.db");
        let store = SqliteStore::open(path.to_str().unwrap()).await.unwrap();

        contract::exercise(&store).await;
    }

    #[tokio::test]
    async fn test_migrations_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evaluations.db");

        let store = SqliteStore::open(path.to_str().unwrap()).await.unwrap();
        let first = store.save("festival poster", &sample_result(), None).await.unwrap();
        drop(store);

        // Reopening must not reapply migrations or lose data
        let store = SqliteStore::open(path.to_str().unwrap()).await.unwrap();
        let record = store.get_by_id(first).await.unwrap().unwrap();
        assert_eq!(record.alt_text, "festival poster");

        let second = store.save("festival poster", &sample_result(), None).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_history_limit_and_offset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evaluations.db");
        let store = SqliteStore::open(path.to_str().unwrap()).await.unwrap();

        for i in 0..5 {
            store
                .save(&format!("alt {}", i), &sample_result(), None)
                .await
                .unwrap();
        }

        let all = store.list_history(50, 0).await.unwrap();
        assert_eq!(all.len(), 5);

        let tail = store.list_history(50, 4).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].alt_text, "alt 0");
    }

    #[tokio::test]
    async fn test_statistics_on_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evaluations.db");
        let store = SqliteStore::open(path.to_str().unwrap()).await.unwrap();

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_evaluations, 0);
        assert!(stats.type_distribution.is_empty());
        assert!(stats.grade_distribution.is_empty());
        assert!(stats.compliant_distribution.is_empty());
    }
}
