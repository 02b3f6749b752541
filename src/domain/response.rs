use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::result::SearchResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub total_results_found: usize,
    pub results_filtered: usize,
    pub processing_time_ms: u64,
    pub cache_used: bool,
    pub providers_queried: Vec<String>,
    pub verified_count: Option<usize>,
}

/// The assembled answer to a [`crate::domain::query::KnowledgeQuery`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub summary: String,
    pub confidence: f64,
    pub sources_used: HashSet<String>,
    #[serde(default)]
    pub verification_results: Option<serde_json::Value>,
    pub metadata: ResponseMetadata,
    pub responded_at: DateTime<Utc>,
}

impl KnowledgeResponse {
    /// Compute the aggregate confidence from per-result scores and the
    /// number of distinct providers that contributed relative to how many
    /// were queried.
    pub fn compute_confidence(results: &[SearchResult], providers_queried: usize) -> f64 {
        if results.is_empty() {
            return 0.0;
        }
        let avg_relevance =
            results.iter().map(|r| r.relevance_score).sum::<f64>() / results.len() as f64;
        let avg_credibility =
            results.iter().map(|r| r.credibility_score).sum::<f64>() / results.len() as f64;
        let unique_providers: HashSet<&str> =
            results.iter().map(|r| r.provider.as_str()).collect();
        let source_diversity = if providers_queried == 0 {
            0.0
        } else {
            (unique_providers.len() as f64 / providers_queried as f64).min(1.0)
        };
        0.4 * avg_relevance + 0.4 * avg_credibility + 0.2 * source_diversity
    }

    /// A short, templated summary sentence.
    pub fn summarize(query: &str, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return format!("No relevant information found for \"{query}\".");
        }
        let mut types: Vec<String> = results
            .iter()
            .map(|r| format!("{:?}", r.source_type).to_lowercase())
            .collect();
        types.dedup();
        format!(
            "Found {} result{} for \"{query}\" across {} source type{}.",
            results.len(),
            if results.len() == 1 { "" } else { "s" },
            types.len(),
            if types.len() == 1 { "" } else { "s" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::ContentType;
    use crate::domain::result::{Quality, SourceType};

    fn result(provider: &str, relevance: f64, credibility: f64) -> SearchResult {
        SearchResult {
            id: "r1".into(),
            query_id: "q1".into(),
            title: "t".into(),
            content: "c".into(),
            url: "https://example.com".into(),
            domain: "example.com".into(),
            source_type: SourceType::Web,
            content_type: ContentType::Article,
            relevance_score: relevance,
            credibility_score: credibility,
            quality: Quality::Medium,
            published_at: None,
            retrieved_at: Utc::now(),
            processed_at: None,
            provider: provider.into(),
            provider_priority: 50,
            provider_metadata: serde_json::Value::Null,
            content_hash: "hash".into(),
        }
    }

    #[test]
    fn empty_results_have_zero_confidence() {
        assert_eq!(KnowledgeResponse::compute_confidence(&[], 1), 0.0);
    }

    #[test]
    fn confidence_matches_weighted_formula() {
        let results = vec![result("a", 0.9, 0.8), result("a", 0.7, 0.7)];
        let confidence = KnowledgeResponse::compute_confidence(&results, 1);
        // avg_relevance = 0.8, avg_credibility = 0.75, diversity = 1/1
        let expected = 0.4 * 0.8 + 0.4 * 0.75 + 0.2 * 1.0;
        assert!((confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn summary_reports_no_results() {
        let summary = KnowledgeResponse::summarize("foo", &[]);
        assert!(summary.contains("No relevant information found"));
    }
}
