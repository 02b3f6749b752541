//! Information Processor (C3): filters, scores, deduplicates, diversifies,
//! and ranks raw provider results into the list a response ships with.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::config::ProcessorConfig;
use crate::domain::{KnowledgeQuery, Quality, SearchResult, SourceType};

pub struct InformationProcessor {
    config: ProcessorConfig,
}

impl InformationProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline described in the design for turning raw
    /// provider output into the results a response carries.
    pub fn process(&self, query: &KnowledgeQuery, mut results: Vec<SearchResult>) -> (Vec<SearchResult>, usize) {
        let found = results.len();

        results.retain(|r| self.passes_filters(query, r));

        for result in &mut results {
            result.relevance_score = self.score_relevance(query, result);
            result.credibility_score = self.assess_credibility(result);
            result.quality =
                Quality::from_combined_score((result.relevance_score + result.credibility_score) / 2.0);
            result.processed_at = Some(Utc::now());
        }

        results = self.deduplicate(results);
        results = self.enforce_diversity(results);

        results.retain(|r| {
            r.relevance_score >= query.relevance_threshold.max(self.config.min_relevance_score)
                && r.credibility_score >= self.config.min_credibility_score
        });

        results.sort_by(|a, b| self.compare_for_ranking(a, b));
        results.truncate(self.config.max_results_to_process.min(query.max_results));

        let filtered = found.saturating_sub(results.len());
        debug!(found, kept = results.len(), filtered, "processed search results");
        (results, filtered)
    }

    fn passes_filters(&self, query: &KnowledgeQuery, result: &SearchResult) -> bool {
        let Some(filters) = &query.filters else {
            return true;
        };
        if let Some(from) = filters.date_from {
            if result.published_at.map_or(false, |p| p < from) {
                return false;
            }
        }
        if let Some(to) = filters.date_to {
            if result.published_at.map_or(false, |p| p > to) {
                return false;
            }
        }
        if let Some(content_types) = &filters.content_types {
            if !content_types.contains(&result.content_type) {
                return false;
            }
        }
        if let Some(min_cred) = filters.min_credibility {
            if result.credibility_score < min_cred {
                return false;
            }
        }
        if let Some(include) = &filters.include_domains {
            if !include.contains(&result.domain) {
                return false;
            }
        }
        if let Some(exclude) = &filters.exclude_domains {
            if exclude.contains(&result.domain) {
                return false;
            }
        }
        true
    }

    /// Weighted sum of title match, snippet match, credibility, and
    /// recency, as laid out in the component design.
    fn score_relevance(&self, query: &KnowledgeQuery, result: &SearchResult) -> f64 {
        let terms: Vec<String> = query
            .query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .filter(|t| t.len() > 2)
            .collect();

        let title_match = term_match_fraction(&terms, &result.title.to_lowercase());
        let snippet_match = term_match_fraction(&terms, &result.content.to_lowercase());
        let recency = recency_score(result);

        let score = 0.4 * title_match + 0.3 * snippet_match + 0.2 * result.credibility_score + 0.1 * recency;
        score.clamp(0.0, 1.0)
    }

    fn assess_credibility(&self, result: &SearchResult) -> f64 {
        if !self.config.quality.enable_credibility_scoring {
            return result.credibility_score;
        }
        let mut score = match result.source_type {
            crate::domain::SourceType::Academic => 0.85,
            crate::domain::SourceType::Documentation => 0.75,
            crate::domain::SourceType::News => 0.6,
            crate::domain::SourceType::Web => 0.5,
            crate::domain::SourceType::Social => 0.3,
            crate::domain::SourceType::Unknown => 0.4,
        };
        if result.domain.ends_with(".edu") || result.domain.ends_with(".gov") {
            score = (score + 0.2).min(1.0);
        }
        if is_low_reputation_domain(&result.domain) {
            score = (score - 0.3).max(0.0);
        }
        score
    }

    fn deduplicate(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        if !self.config.quality.enable_duplicate_detection {
            return results;
        }
        let mut seen = HashSet::new();
        results
            .into_iter()
            .filter(|r| seen.insert(r.content_hash.clone()))
            .collect()
    }

    /// Enforce `max_results_per_domain`, then attempt to cover at least
    /// `min_source_types` distinct source types and `min_sources` distinct
    /// providers by pulling the highest-relevance overflow back in. Coverage
    /// is a best-effort goal, not a hard cap: it can exceed the per-domain
    /// limit for the results it restores.
    fn enforce_diversity(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let cap = self.config.diversity.max_results_per_domain;
        let (mut kept, mut overflow) = if cap == 0 {
            (results, Vec::new())
        } else {
            let mut per_domain: HashMap<String, usize> = HashMap::new();
            let mut kept = Vec::with_capacity(results.len());
            let mut overflow = Vec::new();
            for r in results {
                let count = per_domain.entry(r.domain.clone()).or_insert(0);
                *count += 1;
                if *count <= cap {
                    kept.push(r);
                } else {
                    overflow.push(r);
                }
            }
            (kept, overflow)
        };

        let min_types = self.config.diversity.min_source_types;
        let min_sources = self.config.diversity.min_sources;
        let mut seen_types: HashSet<SourceType> = kept.iter().map(|r| r.source_type).collect();
        let mut seen_providers: HashSet<String> = kept.iter().map(|r| r.provider.clone()).collect();

        if seen_types.len() < min_types || seen_providers.len() < min_sources {
            overflow.sort_by(|a, b| {
                b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(std::cmp::Ordering::Equal)
            });
            let mut i = 0;
            while i < overflow.len() && (seen_types.len() < min_types || seen_providers.len() < min_sources) {
                let adds_coverage =
                    !seen_types.contains(&overflow[i].source_type) || !seen_providers.contains(&overflow[i].provider);
                if adds_coverage {
                    let candidate = overflow.remove(i);
                    seen_types.insert(candidate.source_type);
                    seen_providers.insert(candidate.provider.clone());
                    kept.push(candidate);
                } else {
                    i += 1;
                }
            }
        }

        kept
    }

    fn compare_for_ranking(&self, a: &SearchResult, b: &SearchResult) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        let relevance_diff = b.relevance_score - a.relevance_score;
        if relevance_diff.abs() >= 0.01 {
            return relevance_diff.partial_cmp(&0.0).unwrap_or(Ordering::Equal);
        }
        let credibility_cmp = b
            .credibility_score
            .partial_cmp(&a.credibility_score)
            .unwrap_or(Ordering::Equal);
        if credibility_cmp != Ordering::Equal {
            return credibility_cmp;
        }
        let date_cmp = match (a.published_at, b.published_at) {
            (Some(a_date), Some(b_date)) => b_date.cmp(&a_date),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if date_cmp != Ordering::Equal {
            return date_cmp;
        }
        b.provider_priority.cmp(&a.provider_priority)
    }
}

fn term_match_fraction(terms: &[String], haystack: &str) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let matched = terms.iter().filter(|term| haystack.contains(term.as_str())).count();
    matched as f64 / terms.len() as f64
}

fn recency_score(result: &SearchResult) -> f64 {
    let Some(published) = result.published_at else {
        return 0.5;
    };
    let age = Utc::now().signed_duration_since(published);
    if age.num_days() < 7 {
        1.0
    } else if age.num_days() < 30 {
        0.8
    } else if age.num_days() < 365 {
        0.6
    } else {
        0.3
    }
}

fn is_low_reputation_domain(domain: &str) -> bool {
    const SUSPICIOUS_TLDS: &[&str] = &[".tk", ".ml", ".ga", ".cf"];
    SUSPICIOUS_TLDS.iter().any(|tld| domain.ends_with(tld))
}
