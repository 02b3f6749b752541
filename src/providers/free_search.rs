//! Unauthenticated, aggressively rate-limited free search API adapter.
//! No API key is required, which is exactly why its default rate limit
//! configuration is tighter than [`super::web_search::WebSearchProvider`]'s.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use super::{ProviderHealth, ProviderKind, ProviderRuntime, SearchProvider};
use crate::config::ProviderConfig;
use crate::resilience::RetrySettings;
use crate::domain::{content_hash, domain_of, ContentType, KnowledgeQuery, Quality, SearchResult, SourceType};
use crate::error::Error;

#[derive(Debug, Deserialize)]
struct FreeSearchResponse {
    #[serde(default)]
    results: Vec<FreeSearchHit>,
}

#[derive(Debug, Deserialize)]
struct FreeSearchHit {
    heading: String,
    link: String,
    #[serde(default)]
    abstract_text: String,
}

pub struct FreeSearchProvider {
    config: ProviderConfig,
    runtime: ProviderRuntime,
}

impl FreeSearchProvider {
    pub fn new(config: ProviderConfig, retry: RetrySettings) -> Self {
        let runtime = ProviderRuntime::new(&config.name, config.rate_limit.clone(), retry);
        Self { config, runtime }
    }

    fn endpoint(&self) -> String {
        self.config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.free-search.invalid/v1/query".to_string())
    }
}

#[async_trait]
impl SearchProvider for FreeSearchProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::WebSearch
    }

    fn priority(&self) -> u8 {
        self.config.priority
    }

    async fn search(&self, query: &KnowledgeQuery) -> Result<Vec<SearchResult>, Error> {
        let attempt = || async {
            let response = self
                .runtime
                .client
                .get(self.endpoint())
                .query(&[("q", query.query.as_str())])
                .send()
                .await
                .map_err(|err| Error::NetworkError {
                    provider: self.name().to_string(),
                    message: err.to_string(),
                })?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(Error::RateLimitExceeded {
                    provider: self.name().to_string(),
                    retry_after: std::time::Duration::from_secs(60),
                });
            }
            if !response.status().is_success() {
                let status = response.status();
                return Err(Error::ProviderUnavailable {
                    provider: self.name().to_string(),
                    reason: format!("HTTP {status}"),
                });
            }

            response
                .json::<FreeSearchResponse>()
                .await
                .map_err(|err| Error::ParsingError {
                    provider: self.name().to_string(),
                    message: err.to_string(),
                })
        };

        let parsed = self.runtime.execute(attempt).await?;
        debug!(provider = self.name(), hits = parsed.results.len(), "free search completed");

        Ok(parsed
            .results
            .into_iter()
            .filter(|hit| !hit.heading.is_empty() && !hit.link.is_empty())
            .take(query.max_results)
            .map(|hit| {
                let domain = domain_of(&hit.link);
                SearchResult {
                    id: uuid::Uuid::new_v4().to_string(),
                    query_id: query.id.clone(),
                    content_hash: content_hash(&hit.heading, &hit.link, &hit.abstract_text),
                    title: hit.heading,
                    content: hit.abstract_text,
                    url: hit.link,
                    domain,
                    source_type: SourceType::Web,
                    content_type: ContentType::Article,
                    relevance_score: 0.45,
                    credibility_score: 0.4,
                    quality: Quality::Medium,
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
        self.runtime.is_available().await
    }

    async fn health(&self) -> ProviderHealth {
        self.runtime.health().await
    }
}
