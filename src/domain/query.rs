use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::Error;

/// The kind of answer a query is seeking; drives provider selection and
/// detector query-type inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Factual,
    Explanatory,
    Technical,
    Comparative,
    Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Higher is more urgent; used to order batches in `processQueries`.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
            Priority::Critical => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Article,
    Blog,
    News,
    AcademicPaper,
    Documentation,
    Book,
    Video,
    Podcast,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryFilters {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub content_types: Option<HashSet<ContentType>>,
    pub min_credibility: Option<f64>,
    pub include_domains: Option<HashSet<String>>,
    pub exclude_domains: Option<HashSet<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub requester_id: Option<String>,
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A single research request entering the knowledge seeker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeQuery {
    pub id: String,
    pub query: String,
    pub query_type: QueryType,
    pub max_results: usize,
    pub relevance_threshold: f64,
    pub timeout_ms: u64,
    pub preferred_sources: Option<HashSet<String>>,
    #[serde(default)]
    pub filters: Option<QueryFilters>,
    pub priority: Priority,
    #[serde(default)]
    pub context: HashMap<String, String>,
    #[serde(default)]
    pub metadata: QueryMetadata,
}

impl KnowledgeQuery {
    /// Validate this query against the invariants required of every
    /// incoming request. Returns `Error::InvalidQuery` describing the first
    /// violation found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidQuery {
                field: "id".into(),
                reason: "must not be empty".into(),
            });
        }
        let trimmed = self.query.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidQuery {
                field: "query".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.query.len() > 1000 {
            return Err(Error::InvalidQuery {
                field: "query".into(),
                reason: "must be at most 1000 characters".into(),
            });
        }
        if !(1..=100).contains(&self.max_results) {
            return Err(Error::InvalidQuery {
                field: "max_results".into(),
                reason: "must be between 1 and 100".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.relevance_threshold) {
            return Err(Error::InvalidQuery {
                field: "relevance_threshold".into(),
                reason: "must be between 0.0 and 1.0".into(),
            });
        }
        if !(1..=300_000).contains(&self.timeout_ms) {
            return Err(Error::InvalidQuery {
                field: "timeout_ms".into(),
                reason: "must be between 1 and 300000".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_query() -> KnowledgeQuery {
        KnowledgeQuery {
            id: "q1".into(),
            query: "rust async runtimes".into(),
            query_type: QueryType::Factual,
            max_results: 10,
            relevance_threshold: 0.5,
            timeout_ms: 5000,
            preferred_sources: None,
            filters: None,
            priority: Priority::Medium,
            context: HashMap::new(),
            metadata: QueryMetadata::default(),
        }
    }

    #[test]
    fn rejects_empty_query() {
        let mut q = base_query();
        q.query = "   ".into();
        assert!(q.validate().is_err());
    }

    #[test]
    fn accepts_boundary_lengths() {
        let mut q = base_query();
        q.query = "a".repeat(1000);
        assert!(q.validate().is_ok());
        q.query = "a".repeat(1001);
        assert!(q.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_max_results() {
        let mut q = base_query();
        q.max_results = 0;
        assert!(q.validate().is_err());
        q.max_results = 101;
        assert!(q.validate().is_err());
        q.max_results = 100;
        assert!(q.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_timeout() {
        let mut q = base_query();
        q.timeout_ms = 0;
        assert!(q.validate().is_err());
        q.timeout_ms = 300_001;
        assert!(q.validate().is_err());
        q.timeout_ms = 300_000;
        assert!(q.validate().is_ok());
    }

    #[test]
    fn priority_rank_orders_critical_highest() {
        assert!(Priority::Critical.rank() > Priority::High.rank());
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
    }
}
