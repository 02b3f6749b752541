//! HTTP-provider integration tests run against a mocked server, so no
//! test here ever touches a real network.

use knowledge_seeker::config::{ProviderConfig, ProviderLimits, RateLimitConfig};
use knowledge_seeker::domain::{Priority, QueryMetadata, QueryType};
use knowledge_seeker::resilience::RetrySettings;
use knowledge_seeker::{KnowledgeQuery, SearchProvider};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use knowledge_seeker::providers::web_search::WebSearchProvider;

fn provider_config(base_url: String) -> ProviderConfig {
    ProviderConfig {
        name: "web".into(),
        kind: "web_search".into(),
        base_url: Some(base_url),
        api_key: None,
        enabled: true,
        priority: 60,
        rate_limit: RateLimitConfig::default(),
        limits: ProviderLimits::default(),
        options: Default::default(),
    }
}

fn query(text: &str) -> KnowledgeQuery {
    KnowledgeQuery {
        id: "q1".into(),
        query: text.into(),
        query_type: QueryType::Factual,
        max_results: 10,
        relevance_threshold: 0.0,
        timeout_ms: 5000,
        preferred_sources: None,
        filters: None,
        priority: Priority::Medium,
        context: Default::default(),
        metadata: QueryMetadata::default(),
    }
}

#[tokio::test]
async fn web_search_parses_a_successful_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"title": "Rust Async Book", "url": "https://rust-lang.org/async", "snippet": "an async primer"},
        ])))
        .mount(&server)
        .await;

    let provider = WebSearchProvider::new(
        provider_config(format!("{}/v1/search", server.uri())),
        RetrySettings::default(),
    );

    let results = provider.search(&query("async rust")).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Rust Async Book");
    assert_eq!(results[0].domain, "rust-lang.org");
}

#[tokio::test]
async fn web_search_retries_on_server_error_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"title": "Recovered", "url": "https://example.invalid/a", "snippet": "ok"},
        ])))
        .mount(&server)
        .await;

    let mut settings = RetrySettings::default();
    settings.initial_delay_ms = 1;
    let provider = WebSearchProvider::new(provider_config(format!("{}/v1/search", server.uri())), settings);

    let results = provider.search(&query("async rust")).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Recovered");
}
