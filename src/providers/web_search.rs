//! Generic keyed web-search API adapter: works against any backend that
//! accepts a `q`/`count` query and returns a JSON array of
//! `{title, url, snippet}` objects, which covers most hosted search APIs.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use super::{ProviderHealth, ProviderKind, ProviderRuntime, SearchProvider};
use crate::config::ProviderConfig;
use crate::resilience::RetrySettings;
use crate::domain::{content_hash, domain_of, ContentType, KnowledgeQuery, SearchResult, SourceType};
use crate::error::Error;

#[derive(Debug, Deserialize)]
struct RawHit {
    title: String,
    url: String,
    #[serde(default)]
    snippet: String,
}

pub struct WebSearchProvider {
    config: ProviderConfig,
    runtime: ProviderRuntime,
}

impl WebSearchProvider {
    pub fn new(config: ProviderConfig, retry: RetrySettings) -> Self {
        let runtime = ProviderRuntime::new(&config.name, config.rate_limit.clone(), retry);
        Self { config, runtime }
    }

    fn endpoint(&self) -> String {
        self.config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.example-search.invalid/v1/search".to_string())
    }
}

#[async_trait]
impl SearchProvider for WebSearchProvider {
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
            let mut request = self.runtime.client.get(self.endpoint()).query(&[
                ("q", query.query.as_str()),
                ("count", &query.max_results.to_string()),
            ]);
            if let Some(key) = &self.config.api_key {
                request = request.bearer_auth(key);
            }

            let response = request.send().await.map_err(|err| Error::NetworkError {
                provider: self.name().to_string(),
                message: err.to_string(),
            })?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(Error::RateLimitExceeded {
                    provider: self.name().to_string(),
                    retry_after: std::time::Duration::from_secs(30),
                });
            }
            if !response.status().is_success() {
                let status = response.status();
                return Err(Error::ProviderUnavailable {
                    provider: self.name().to_string(),
                    reason: format!("HTTP {status}"),
                });
            }

            response.json::<Vec<RawHit>>().await.map_err(|err| Error::ParsingError {
                provider: self.name().to_string(),
                message: err.to_string(),
            })
        };

        let hits = self.runtime.execute(attempt).await?;
        debug!(provider = self.name(), hits = hits.len(), "web search completed");

        Ok(hits
            .into_iter()
            .take(query.max_results)
            .map(|hit| {
                let domain = domain_of(&hit.url);
                SearchResult {
                    id: uuid::Uuid::new_v4().to_string(),
                    query_id: query.id.clone(),
                    content_hash: content_hash(&hit.title, &hit.url, &hit.snippet),
                    title: hit.title,
                    content: hit.snippet,
                    url: hit.url,
                    domain,
                    source_type: SourceType::Web,
                    content_type: ContentType::Article,
                    relevance_score: 0.5,
                    credibility_score: 0.5,
                    quality: crate::domain::Quality::Medium,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;

    fn provider_config() -> ProviderConfig {
        ProviderConfig {
            name: "web".into(),
            kind: "web_search".into(),
            base_url: Some("https://example.invalid/search".into()),
            api_key: None,
            enabled: true,
            priority: 60,
            rate_limit: RateLimitConfig::default(),
            limits: Default::default(),
            options: Default::default(),
        }
    }

    #[test]
    fn provider_reports_configured_priority() {
        let provider = WebSearchProvider::new(provider_config(), RetrySettings::default());
        assert_eq!(provider.priority(), 60);
        assert_eq!(provider.name(), "web");
    }
}
