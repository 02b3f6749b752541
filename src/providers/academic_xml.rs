//! Atom/XML academic feed adapter, generalized from an arXiv-style API:
//! builds a query URL, fetches an Atom feed, and walks `<entry>` elements
//! with `roxmltree` to produce normalized [`SearchResult`]s.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{ProviderHealth, ProviderKind, ProviderRuntime, SearchProvider};
use crate::config::ProviderConfig;
use crate::resilience::RetrySettings;
use crate::domain::{content_hash, domain_of, ContentType, KnowledgeQuery, Quality, SearchResult, SourceType};
use crate::error::Error;

pub struct AcademicXmlProvider {
    config: ProviderConfig,
    runtime: ProviderRuntime,
}

impl AcademicXmlProvider {
    pub fn new(config: ProviderConfig, retry: RetrySettings) -> Self {
        let runtime = ProviderRuntime::new(&config.name, config.rate_limit.clone(), retry);
        Self { config, runtime }
    }

    fn endpoint(&self) -> String {
        self.config
            .base_url
            .clone()
            .unwrap_or_else(|| "http://export.arxiv.org/api/query".to_string())
    }

    fn build_url(&self, query: &KnowledgeQuery) -> Result<String, Error> {
        let mut url = url::Url::parse(&self.endpoint()).map_err(|err| Error::Configuration(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("search_query", &format!("all:\"{}\"", query.query))
            .append_pair("start", "0")
            .append_pair("max_results", &query.max_results.to_string())
            .append_pair("sortBy", "relevance")
            .append_pair("sortOrder", "descending");
        Ok(url.to_string())
    }

    fn parse_feed(&self, body: &str, query_id: &str) -> Result<Vec<SearchResult>, Error> {
        let doc = roxmltree::Document::parse(body).map_err(|err| Error::ParsingError {
            provider: self.name().to_string(),
            message: err.to_string(),
        })?;

        let mut results = Vec::new();
        for entry in doc.descendants().filter(|n| n.has_tag_name("entry")) {
            let mut title = None;
            let mut summary = String::new();
            let mut url = None;
            let mut published: Option<DateTime<Utc>> = None;

            for child in entry.children().filter(|n| n.is_element()) {
                match child.tag_name().name() {
                    "title" => {
                        title = child
                            .text()
                            .map(|t| t.trim().replace('\n', " ").replace("  ", " "));
                    }
                    "summary" => {
                        summary = child
                            .text()
                            .map(|t| t.trim().replace('\n', " ").replace("  ", " "))
                            .unwrap_or_default();
                    }
                    "published" => {
                        published = child
                            .text()
                            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                            .map(|dt| dt.with_timezone(&Utc));
                    }
                    "id" => {
                        if url.is_none() {
                            url = child.text().map(str::to_string);
                        }
                    }
                    "link" => {
                        if child.attribute("type") == Some("application/pdf") {
                            url = child.attribute("href").map(str::to_string);
                        }
                    }
                    _ => {}
                }
            }

            if let (Some(title), Some(url)) = (title, url) {
                let domain = domain_of(&url);
                results.push(SearchResult {
                    id: uuid::Uuid::new_v4().to_string(),
                    query_id: query_id.to_string(),
                    content_hash: content_hash(&title, &url, &summary),
                    title,
                    content: summary,
                    url,
                    domain,
                    source_type: SourceType::Academic,
                    content_type: ContentType::AcademicPaper,
                    relevance_score: 0.6,
                    credibility_score: 0.8,
                    quality: Quality::High,
                    published_at: published,
                    retrieved_at: Utc::now(),
                    processed_at: None,
                    provider: self.name().to_string(),
                    provider_priority: self.priority(),
                    provider_metadata: serde_json::Value::Null,
                });
            }
        }

        debug!(provider = self.name(), count = results.len(), "parsed academic feed");
        Ok(results)
    }
}

#[async_trait]
impl SearchProvider for AcademicXmlProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::AcademicSearch
    }

    fn priority(&self) -> u8 {
        self.config.priority
    }

    async fn search(&self, query: &KnowledgeQuery) -> Result<Vec<SearchResult>, Error> {
        let url = self.build_url(query)?;
        let attempt = || async {
            let response = self.runtime.client.get(&url).send().await.map_err(|err| Error::NetworkError {
                provider: self.name().to_string(),
                message: err.to_string(),
            })?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(Error::RateLimitExceeded {
                    provider: self.name().to_string(),
                    retry_after: std::time::Duration::from_secs(30),
                });
            }
            if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                return Err(Error::ProviderUnavailable {
                    provider: self.name().to_string(),
                    reason: "service temporarily unavailable".to_string(),
                });
            }
            if !response.status().is_success() {
                let status = response.status();
                return Err(Error::ProviderUnavailable {
                    provider: self.name().to_string(),
                    reason: format!("HTTP {status}"),
                });
            }

            let body = response.text().await.map_err(|err| Error::NetworkError {
                provider: self.name().to_string(),
                message: err.to_string(),
            })?;

            self.parse_feed(&body, &query.id)
        };

        let results = self.runtime.execute(attempt).await?;
        Ok(results.into_iter().take(query.max_results).collect())
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
    use crate::domain::{Priority, QueryMetadata, QueryType};
    use std::collections::HashMap;

    fn provider() -> AcademicXmlProvider {
        AcademicXmlProvider::new(
            ProviderConfig {
                name: "academic".into(),
                kind: "academic_xml".into(),
                base_url: None,
                api_key: None,
                enabled: true,
                priority: 80,
                rate_limit: RateLimitConfig::default(),
                limits: Default::default(),
                options: Default::default(),
            },
            RetrySettings::default(),
        )
    }

    fn sample_query() -> KnowledgeQuery {
        KnowledgeQuery {
            id: "q1".into(),
            query: "quantum computing".into(),
            query_type: QueryType::Technical,
            max_results: 10,
            relevance_threshold: 0.3,
            timeout_ms: 5000,
            preferred_sources: None,
            filters: None,
            priority: Priority::Medium,
            context: HashMap::new(),
            metadata: QueryMetadata::default(),
        }
    }

    #[test]
    fn build_url_embeds_query_and_limits() {
        let provider = provider();
        let url = provider.build_url(&sample_query()).unwrap();
        assert!(url.contains("max_results=10"));
        assert!(url.contains("search_query"));
    }

    #[test]
    fn parse_feed_extracts_entries() {
        let provider = provider();
        let feed = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://export.arxiv.org/abs/1234.5678</id>
    <title>A Paper About Quantum Things</title>
    <summary>This paper studies quantum things in detail.</summary>
    <published>2023-01-02T00:00:00Z</published>
    <link href="http://export.arxiv.org/pdf/1234.5678" type="application/pdf"/>
  </entry>
</feed>"#;
        let results = provider.parse_feed(feed, "q1").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "A Paper About Quantum Things");
        assert_eq!(results[0].url, "http://export.arxiv.org/pdf/1234.5678");
        assert_eq!(results[0].source_type, SourceType::Academic);
    }
}
