//! Storage layer for evaluation records
//!
//! Provides an append-only log of evaluations with read-side aggregation.
//! Two interchangeable backends implement the same trait: an embedded SQLite
//! file (the default) and a networked Postgres server, selected once at
//! startup from configuration. Query semantics are identical across both and
//! are pinned down by a shared contract suite in this module's tests.

pub mod postgres;
pub mod sqlite;

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::types::{AggregateStats, EvaluationRecord, EvaluationResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Storage backend trait defining all required operations
///
/// Records are immutable once written; there is deliberately no update or
/// delete operation.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    /// Insert one record; the store assigns the id and the timestamp
    async fn save(
        &self,
        alt_text: &str,
        result: &EvaluationResult,
        image_data: Option<&str>,
    ) -> Result<i64>;

    /// Most recent records first; limit/offset apply after ordering
    async fn list_history(&self, limit: i64, offset: i64) -> Result<Vec<EvaluationRecord>>;

    /// Point lookup; absence is `Ok(None)`, never an error
    async fn get_by_id(&self, id: i64) -> Result<Option<EvaluationRecord>>;

    /// Total count plus counts grouped by type, grade and compliant ordinal
    async fn statistics(&self) -> Result<AggregateStats>;
}

/// Open the backend selected by configuration
///
/// A configured connection string selects Postgres; otherwise the embedded
/// SQLite file is opened (and created if missing).
pub async fn connect(config: &ServiceConfig) -> Result<Arc<dyn EvaluationStore>> {
    match &config.database_url {
        Some(url) => {
            info!("Using Postgres storage backend");
            Ok(Arc::new(postgres::PostgresStore::connect(url).await?))
        }
        None => {
            info!("Using embedded SQLite storage backend: {}", config.db_path);
            Ok(Arc::new(sqlite::SqliteStore::open(&config.db_path).await?))
        }
    }
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behavioral suite both backends must satisfy
    //!
    //! Runs against an empty store in the SQLite tests and a truncated table
    //! in the (credentialed, ignored-by-default) Postgres test.

    use super::EvaluationStore;
    use crate::types::EvaluationResult;
    use chrono::Utc;

    fn verdict(image_type: &str, grade: &str, compliant: i64) -> EvaluationResult {
        EvaluationResult {
            image_type: image_type.to_string(),
            grade: grade.to_string(),
            reason: "test reason".to_string(),
            improvement: "test improvement".to_string(),
            compliant,
        }
    }

    pub(crate) async fn exercise(store: &dyn EvaluationStore) {
        // ids are store-assigned and strictly increasing
        let first = store
            .save(
                "spring festival poster",
                &verdict("informational", "very-high", 0),
                Some("data:image/jpeg;base64,AAAA"),
            )
            .await
            .unwrap();
        let second = store
            .save("search button", &verdict("functional", "somewhat-high", 1), None)
            .await
            .unwrap();
        let third = store
            .save(
                "section divider",
                &verdict("decorative", "very-low", 3),
                Some("data:image/jpeg;base64,BBBB"),
            )
            .await
            .unwrap();
        let fourth = store
            .save(
                "quarterly revenue chart",
                &verdict("complex", "somewhat-low", 2),
                Some("data:image/jpeg;base64,CCCC"),
            )
            .await
            .unwrap();
        assert!(first < second && second < third && third < fourth);

        // point lookup round-trips every field and carries a timestamp
        let record = store
            .get_by_id(second)
            .await
            .unwrap()
            .expect("saved record should be found");
        assert_eq!(record.id, second);
        assert_eq!(record.alt_text, "search button");
        assert_eq!(record.image_type.as_deref(), Some("functional"));
        assert_eq!(record.grade.as_deref(), Some("somewhat-high"));
        assert_eq!(record.reason.as_deref(), Some("test reason"));
        assert_eq!(record.improvement.as_deref(), Some("test improvement"));
        assert_eq!(record.compliant, Some(1));
        assert_eq!(record.image_data, None);
        assert!(record.created_at <= Utc::now());

        // absent ids are None, not an error
        assert!(store.get_by_id(999_999).await.unwrap().is_none());

        // newest first; pages are disjoint and contiguous
        let page1 = store.list_history(2, 0).await.unwrap();
        let page2 = store.list_history(2, 2).await.unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page2.len(), 2);
        assert_eq!(page1[0].id, fourth);
        assert_eq!(page1[1].id, third);
        let ids: Vec<i64> = page1.iter().chain(page2.iter()).map(|r| r.id).collect();
        assert!(ids.windows(2).all(|pair| pair[0] > pair[1]));

        // image payload survives the round trip
        let record = store.get_by_id(third).await.unwrap().unwrap();
        assert_eq!(record.image_data.as_deref(), Some("data:image/jpeg;base64,BBBB"));

        // each distribution sums to the total
        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_evaluations, 4);
        for distribution in [
            &stats.type_distribution,
            &stats.grade_distribution,
            &stats.compliant_distribution,
        ] {
            assert_eq!(distribution.values().sum::<i64>(), stats.total_evaluations);
        }
        assert_eq!(stats.type_distribution.get("informational"), Some(&1));
        assert_eq!(stats.grade_distribution.get("very-high"), Some(&1));
        assert_eq!(stats.compliant_distribution.get("1"), Some(&1));
    }
}
