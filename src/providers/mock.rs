//! Deterministic, seedable provider used by the scenario tests in the
//! test suite; never makes a network call.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{ProviderHealth, ProviderKind, SearchProvider};
use crate::config::ProviderConfig;
use crate::domain::{content_hash, domain_of, ContentType, KnowledgeQuery, Quality, SearchResult, SourceType};
use crate::error::Error;

/// A single canned result a [`MockProvider`] will return for a query.
#[derive(Debug, Clone)]
pub struct FixtureResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub relevance_score: f64,
    pub credibility_score: f64,
}

pub struct MockProvider {
    config: ProviderConfig,
    fixtures: RwLock<HashMap<String, Vec<FixtureResult>>>,
    fail_next: RwLock<Option<String>>,
}

impl MockProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            fixtures: RwLock::new(HashMap::new()),
            fail_next: RwLock::new(None),
        }
    }

    /// Register the results this provider should return for an exact
    /// query string.
    pub fn with_fixture(self, query: impl Into<String>, results: Vec<FixtureResult>) -> Self {
        self.fixtures.write().unwrap().insert(query.into(), results);
        self
    }

    /// Make the next `search` call fail with `ProviderUnavailable`.
    pub fn fail_next_call(&self, reason: impl Into<String>) {
        *self.fail_next.write().unwrap() = Some(reason.into());
    }
}

#[async_trait]
impl SearchProvider for MockProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn priority(&self) -> u8 {
        self.config.priority
    }

    async fn search(&self, query: &KnowledgeQuery) -> Result<Vec<SearchResult>, Error> {
        if let Some(reason) = self.fail_next.write().unwrap().take() {
            return Err(Error::ProviderUnavailable {
                provider: self.name().to_string(),
                reason,
            });
        }

        let fixtures = self.fixtures.read().unwrap();
        let hits = fixtures.get(&query.query).cloned().unwrap_or_default();

        Ok(hits
            .into_iter()
            .take(query.max_results)
            .map(|fixture| {
                let domain = domain_of(&fixture.url);
                SearchResult {
                    id: uuid::Uuid::new_v4().to_string(),
                    query_id: query.id.clone(),
                    content_hash: content_hash(&fixture.title, &fixture.url, &fixture.content),
                    title: fixture.title,
                    content: fixture.content,
                    url: fixture.url,
                    domain,
                    source_type: SourceType::Web,
                    content_type: ContentType::Article,
                    relevance_score: fixture.relevance_score,
                    credibility_score: fixture.credibility_score,
                    quality: Quality::from_combined_score(
                        (fixture.relevance_score + fixture.credibility_score) / 2.0,
                    ),
                    published_at: None,
                    retrieved_at: Utc::now(),
                    processed_at: None,
                    provider: self.name().to_string(),
                    provider_priority: self.priority(),
                    provider_metadata: serde_json::Value::Null,
                }
            })
            .collect())
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn health(&self) -> ProviderHealth {
        ProviderHealth::default()
    }
}
