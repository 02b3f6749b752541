//! Research Provenance (C8): an append-only audit trail of research
//! attempts. Writes are always best-effort — storage failures are logged
//! and swallowed so they never interrupt the augmentation path.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchProvenanceRecord {
    pub task_id: String,
    pub queries: Vec<String>,
    pub findings_count: usize,
    pub confidence: f64,
    pub performed_at: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub successful: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvenanceStatistics {
    pub total_records: usize,
    pub successful: usize,
    pub failed: usize,
    pub avg_confidence: f64,
    pub avg_duration_ms: f64,
}

/// Storage port for provenance records, kept separate from
/// [`crate::cache::ResponseCache`] so a durable implementation can be
/// swapped in without touching the augmenter's call sites.
#[async_trait]
pub trait ProvenanceStore: Send + Sync {
    async fn insert(&self, record: ResearchProvenanceRecord);
    async fn for_task(&self, task_id: &str) -> Vec<ResearchProvenanceRecord>;
    async fn statistics(&self, since: Option<DateTime<Utc>>) -> ProvenanceStatistics;
    async fn delete_older_than(&self, retention: ChronoDuration) -> usize;
}

#[derive(Default)]
pub struct InMemoryProvenanceStore {
    records: RwLock<Vec<ResearchProvenanceRecord>>,
}

#[async_trait]
impl ProvenanceStore for InMemoryProvenanceStore {
    async fn insert(&self, record: ResearchProvenanceRecord) {
        self.records.write().await.push(record);
    }

    async fn for_task(&self, task_id: &str) -> Vec<ResearchProvenanceRecord> {
        let mut matching: Vec<_> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.performed_at.cmp(&a.performed_at));
        matching
    }

    async fn statistics(&self, since: Option<DateTime<Utc>>) -> ProvenanceStatistics {
        let records = self.records.read().await;
        let relevant: Vec<&ResearchProvenanceRecord> = records
            .iter()
            .filter(|r| since.map_or(true, |cutoff| r.performed_at >= cutoff))
            .collect();

        if relevant.is_empty() {
            return ProvenanceStatistics::default();
        }

        let successful = relevant.iter().filter(|r| r.successful).count();
        let failed = relevant.len() - successful;
        let avg_confidence =
            relevant.iter().map(|r| r.confidence).sum::<f64>() / relevant.len() as f64;
        let durations: Vec<u64> = relevant.iter().filter_map(|r| r.duration_ms).collect();
        let avg_duration_ms = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<u64>() as f64 / durations.len() as f64
        };

        ProvenanceStatistics {
            total_records: relevant.len(),
            successful,
            failed,
            avg_confidence,
            avg_duration_ms,
        }
    }

    async fn delete_older_than(&self, retention: ChronoDuration) -> usize {
        let cutoff = Utc::now() - retention;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.performed_at >= cutoff);
        before - records.len()
    }
}

/// Facade the augmenter talks to; never propagates storage errors.
pub struct ProvenanceLog {
    store: Arc<dyn ProvenanceStore>,
}

impl ProvenanceLog {
    pub fn new(store: Arc<dyn ProvenanceStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryProvenanceStore::default()))
    }

    pub async fn record_research(
        &self,
        task_id: &str,
        queries: Vec<String>,
        findings_count: usize,
        confidence: f64,
        duration_ms: u64,
    ) {
        self.store
            .insert(ResearchProvenanceRecord {
                task_id: task_id.to_string(),
                queries,
                findings_count,
                confidence,
                performed_at: Utc::now(),
                duration_ms: Some(duration_ms),
                successful: true,
                error: None,
            })
            .await;
    }

    pub async fn record_failure(&self, task_id: &str, queries: Vec<String>, error: &str) {
        self.store
            .insert(ResearchProvenanceRecord {
                task_id: task_id.to_string(),
                queries,
                findings_count: 0,
                confidence: 0.0,
                performed_at: Utc::now(),
                duration_ms: None,
                successful: false,
                error: Some(error.to_string()),
            })
            .await;
        warn!(task_id, error, "research augmentation failed");
    }

    pub async fn task_history(&self, task_id: &str) -> Vec<ResearchProvenanceRecord> {
        self.store.for_task(task_id).await
    }

    pub async fn statistics(&self, since: Option<DateTime<Utc>>) -> ProvenanceStatistics {
        self.store.statistics(since).await
    }

    pub async fn cleanup_older_than_days(&self, days: i64) -> usize {
        self.store.delete_older_than(ChronoDuration::days(days)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_history_most_recent_first() {
        let log = ProvenanceLog::in_memory();
        log.record_research("t1", vec!["q1".into()], 2, 0.8, 100).await;
        log.record_research("t1", vec!["q2".into()], 1, 0.5, 50).await;
        let history = log.task_history("t1").await;
        assert_eq!(history.len(), 2);
        assert!(history[0].performed_at >= history[1].performed_at);
    }

    #[tokio::test]
    async fn failure_is_recorded_without_panicking() {
        let log = ProvenanceLog::in_memory();
        log.record_failure("t1", vec!["q1".into()], "boom").await;
        let history = log.task_history("t1").await;
        assert_eq!(history.len(), 1);
        assert!(!history[0].successful);
    }

    #[tokio::test]
    async fn statistics_aggregate_across_records() {
        let log = ProvenanceLog::in_memory();
        log.record_research("t1", vec!["q1".into()], 1, 1.0, 100).await;
        log.record_failure("t2", vec!["q2".into()], "fail").await;
        let stats = log.statistics(None).await;
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn cleanup_removes_old_records() {
        let log = ProvenanceLog::in_memory();
        log.record_research("t1", vec!["q1".into()], 1, 1.0, 10).await;
        let removed = log.cleanup_older_than_days(90).await;
        assert_eq!(removed, 0);
    }
}
