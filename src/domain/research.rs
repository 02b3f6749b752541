use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::query::QueryType;

/// Output of the research detector: whether a task needs research and, if
/// so, the queries it suggests running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequirement {
    pub required: bool,
    pub confidence: f64,
    pub query_type: QueryType,
    pub suggested_queries: Vec<String>,
    pub indicators: HashMap<String, bool>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFinding {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchFinding {
    pub query: String,
    pub summary: String,
    pub confidence: f64,
    pub key_findings: Vec<KeyFinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchContextMetadata {
    pub duration_ms: u64,
    pub detector_confidence: f64,
    pub query_type: QueryType,
}

/// Research findings attached to a task, produced by the augmenter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchContext {
    pub queries: Vec<String>,
    pub findings: Vec<ResearchFinding>,
    pub confidence: f64,
    pub augmented_at: DateTime<Utc>,
    pub requirement: ResearchRequirement,
    pub metadata: ResearchContextMetadata,
}

/// A generic task as consumed by the augmenter. Only the fields the
/// augmenter needs to read are modeled; an external orchestrator's richer
/// task type is expected to carry additional fields opaque to this crate
/// via `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A task annotated with the outcome of research augmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentedTask {
    #[serde(flatten)]
    pub task: Task,
    pub research_provided: bool,
    pub research_context: Option<ResearchContext>,
}

impl AugmentedTask {
    pub fn without_research(task: Task) -> Self {
        Self {
            task,
            research_provided: false,
            research_context: None,
        }
    }

    pub fn has_research(&self) -> bool {
        self.research_provided && self.research_context.is_some()
    }

    /// Multi-line human-readable summary of the attached findings, or an
    /// empty string if none are present.
    pub fn research_summary(&self) -> String {
        let Some(context) = &self.research_context else {
            return String::new();
        };
        let mut lines = vec![format!(
            "Research findings (confidence: {:.0}%):",
            context.confidence * 100.0
        )];
        for finding in &context.findings {
            lines.push(format!(
                "- {} (confidence: {:.0}%): {}",
                finding.query,
                finding.confidence * 100.0,
                finding.summary
            ));
        }
        lines.join("\n")
    }

    /// Deduplicated `(title, url)` pairs across all findings' key findings.
    pub fn research_sources(&self) -> Vec<(String, String)> {
        let Some(context) = &self.research_context else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        let mut sources = Vec::new();
        for finding in &context.findings {
            for key_finding in &finding.key_findings {
                if seen.insert(key_finding.url.clone()) {
                    sources.push((key_finding.title.clone(), key_finding.url.clone()));
                }
            }
        }
        sources
    }
}
