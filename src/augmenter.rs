//! Task Research Augmenter (C7): the entry point an external orchestrator
//! calls before handing a task to an agent. Detects whether research is
//! warranted, runs it through the Seeker, and attaches the findings. Every
//! failure along this path is isolated: the task is always returned, with
//! `research_provided=false` on anything but a clean success.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::cache::ResponseCache;
use crate::config::AugmenterConfig;
use crate::detector::ResearchDetector;
use crate::domain::{
    AugmentedTask, KeyFinding, KnowledgeQuery, Priority, QueryMetadata, QueryType,
    ResearchContext, ResearchContextMetadata, ResearchFinding, SearchResult, Task,
};
use crate::provenance::ProvenanceLog;
use crate::seeker::KnowledgeSeeker;

pub struct TaskResearchAugmenter {
    config: AugmenterConfig,
    detector: ResearchDetector,
    seeker: Arc<KnowledgeSeeker>,
    provenance: ProvenanceLog,
}

impl TaskResearchAugmenter {
    pub fn new(
        config: AugmenterConfig,
        detector: ResearchDetector,
        seeker: Arc<KnowledgeSeeker>,
        provenance: ProvenanceLog,
    ) -> Self {
        Self {
            config,
            detector,
            seeker,
            provenance,
        }
    }

    /// Decide whether `task` needs research, run it if so, and return a
    /// task annotated with the outcome. Never returns an error: anything
    /// that goes wrong downgrades to `research_provided=false`.
    pub async fn augment(&self, task: Task) -> AugmentedTask {
        let Some(requirement) = self.detector.detect(&task) else {
            return AugmentedTask::without_research(task);
        };

        if requirement.suggested_queries.is_empty() {
            return AugmentedTask::without_research(task);
        }

        let start = Instant::now();
        let queries: Vec<String> = requirement
            .suggested_queries
            .iter()
            .take(self.config.max_queries)
            .cloned()
            .collect();

        // Execute every suggested query concurrently via the Seeker;
        // a single query's failure yields no finding rather than
        // aborting the rest of the batch.
        let outcomes = join_all(queries.iter().map(|query_text| {
            let knowledge_query = KnowledgeQuery {
                id: uuid::Uuid::new_v4().to_string(),
                query: query_text.clone(),
                query_type: requirement.query_type,
                max_results: self.config.max_results_per_query,
                relevance_threshold: self.config.relevance_threshold,
                timeout_ms: self.config.timeout_ms,
                preferred_sources: None,
                filters: None,
                priority: Priority::Medium,
                context: HashMap::new(),
                metadata: QueryMetadata::default(),
            };
            async move { (query_text, self.seeker.process_query(knowledge_query).await) }
        }))
        .await;

        let mut findings = Vec::with_capacity(queries.len());
        for (query_text, outcome) in outcomes {
            match outcome {
                Ok(response) => {
                    findings.push(ResearchFinding {
                        query: query_text.clone(),
                        summary: response.summary,
                        confidence: response.confidence,
                        key_findings: response
                            .results
                            .iter()
                            .take(self.config.max_results_per_query)
                            .map(key_finding_from_result)
                            .collect(),
                    });
                }
                Err(err) => {
                    warn!(task_id = %task.id, query = %query_text, error = %err, "research query failed");
                }
            }
        }

        let findings_count: usize = findings.iter().map(|f| f.key_findings.len()).sum();
        if findings.is_empty() || findings_count == 0 {
            self.provenance
                .record_failure(&task.id, queries, "no provider returned usable results")
                .await;
            return AugmentedTask::without_research(task);
        }

        let confidence = findings.iter().map(|f| f.confidence).sum::<f64>() / findings.len() as f64;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.provenance
            .record_research(&task.id, queries.clone(), findings_count, confidence, duration_ms)
            .await;

        info!(task_id = %task.id, queries = queries.len(), confidence, "attached research context to task");

        let context = ResearchContext {
            queries,
            findings,
            confidence,
            augmented_at: chrono::Utc::now(),
            requirement: requirement.clone(),
            metadata: ResearchContextMetadata {
                duration_ms,
                detector_confidence: requirement.confidence,
                query_type: requirement.query_type,
            },
        };

        AugmentedTask {
            task,
            research_provided: true,
            research_context: Some(context),
        }
    }

    /// Augment a batch of tasks, isolating each task's failures from the
    /// others.
    pub async fn augment_batch(&self, tasks: Vec<Task>) -> Vec<AugmentedTask> {
        let mut augmented = Vec::with_capacity(tasks.len());
        for task in tasks {
            augmented.push(self.augment(task).await);
        }
        augmented
    }
}

fn key_finding_from_result(result: &SearchResult) -> KeyFinding {
    KeyFinding {
        title: result.title.clone(),
        url: result.url.clone(),
        snippet: result.content.chars().take(200).collect(),
        relevance: result.relevance_score,
    }
}
