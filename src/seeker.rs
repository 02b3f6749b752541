//! Knowledge Seeker (C5): validates a query, fans out to providers in
//! parallel with settled semantics, processes and caches the results, and
//! assembles the response. Grounded on the same semaphore-gated
//! `tokio::spawn` fan-out pattern used for meta-search across providers,
//! generalized with explicit cancellation and an injected event sink.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, ResponseCache};
use crate::config::SeekerConfig;
use crate::domain::{KnowledgeQuery, KnowledgeResponse, QueryType, ResponseMetadata, SearchResult};
use crate::error::Error;
use crate::events::{Event, EventSink, EventType, Severity};
use crate::processor::InformationProcessor;
use crate::providers::{ProviderRegistry, SearchProvider};
use crate::resilience::health::{HealthCheck, HealthCheckManager, HealthCheckResult, HealthStatus};

/// Health/cache/processing snapshot returned by [`KnowledgeSeeker::status`].
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub name: String,
    pub available: bool,
}

#[derive(Debug, Clone)]
pub struct SeekerStatus {
    pub enabled: bool,
    pub providers: Vec<ProviderStatus>,
    pub cache_size: usize,
    pub cache_hit_rate: f64,
    pub system_health: HealthStatus,
}

/// Adapts a [`SearchProvider`] to the generic [`HealthCheck`] contract so
/// `status()` can fold per-provider health into one system-wide verdict
/// via [`HealthCheckManager`], rather than hand-rolling its own rollup.
struct ProviderHealthCheck(Arc<dyn SearchProvider>);

#[async_trait]
impl HealthCheck for ProviderHealthCheck {
    async fn check_health(&self) -> HealthCheckResult {
        let start = Instant::now();
        let available = self.0.is_available().await;
        let health = self.0.health().await;
        let status = if !available {
            HealthStatus::Unhealthy {
                reason: health
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "provider unavailable".to_string()),
            }
        } else if health.error_rate_ema > 0.5 {
            HealthStatus::Degraded {
                reason: format!("elevated error rate: {:.2}", health.error_rate_ema),
            }
        } else {
            HealthStatus::Healthy
        };
        HealthCheckResult::new(status, start.elapsed())
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}

/// Shared slot for one in-flight query id: the first caller to register it
/// runs the query; subsequent callers with the same `query.id` await
/// `notify` and then read the finished result directly out of `outcome`,
/// rather than re-reading the cache (which may be disabled).
#[derive(Default)]
struct InFlightSlot {
    notify: tokio::sync::Notify,
    outcome: Mutex<Option<Result<KnowledgeResponse, String>>>,
}

pub struct KnowledgeSeeker {
    config: SeekerConfig,
    registry: Arc<ProviderRegistry>,
    processor: InformationProcessor,
    cache: Arc<ResponseCache>,
    events: Arc<dyn EventSink>,
    concurrency_gate: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashMap<String, Arc<InFlightSlot>>>>,
    active_count: Arc<AtomicUsize>,
}

impl KnowledgeSeeker {
    pub fn new(
        config: SeekerConfig,
        registry: Arc<ProviderRegistry>,
        processor: InformationProcessor,
        cache: Arc<ResponseCache>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let max_concurrent = config.max_concurrent_searches.max(1);
        Self {
            config,
            registry,
            processor,
            cache,
            events,
            concurrency_gate: Arc::new(Semaphore::new(max_concurrent)),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Process a single query end to end.
    pub async fn process_query(&self, query: KnowledgeQuery) -> Result<KnowledgeResponse, Error> {
        query.validate()?;
        self.events.emit(Event::new(EventType::QueryReceived, "seeker").with_metadata(
            serde_json::json!({ "query_id": query.id }),
        ));

        if !self.config.enabled {
            return Ok(self.empty_response(&query, Vec::new()));
        }

        let key = cache_key(&query);
        if self.config.cache_enabled {
            if let Some(cached) = self.cache.get(&key).await {
                return Ok(cached);
            }
        }

        // In-flight deduplication: if another caller is already processing
        // a query with this same id, wait for it to finish and take its
        // result directly instead of re-reading the cache.
        let slot = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(existing) = in_flight.get(&query.id) {
                Some(existing.clone())
            } else {
                in_flight.insert(query.id.clone(), Arc::new(InFlightSlot::default()));
                None
            }
        };

        if let Some(slot) = slot {
            slot.notify.notified().await;
            return match slot.outcome.lock().await.clone() {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => Err(Error::Other(message)),
                None => Err(Error::Other(
                    "in-flight request resolved without a result".to_string(),
                )),
            };
        }

        let result = self.process_uncached(&query).await;

        if let Some(slot) = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight.remove(&query.id)
        } {
            let outcome = match &result {
                Ok(response) => Ok(response.clone()),
                Err(err) => Err(err.to_string()),
            };
            *slot.outcome.lock().await = Some(outcome);
            slot.notify.notify_waiters();
        }

        result
    }

    async fn process_uncached(&self, query: &KnowledgeQuery) -> Result<KnowledgeResponse, Error> {
        let permit = {
            // Compare-and-swap loop: check-then-increment must be atomic
            // across concurrent callers, which a plain fetch_add can't give.
            loop {
                let active = self.active_count.load(Ordering::Acquire);
                if active >= self.config.max_concurrent_searches {
                    // Local concurrency cap, not a provider-side limit, but the
                    // spec treats it as the same caller-facing condition.
                    return Err(Error::RateLimitExceeded {
                        provider: "seeker".to_string(),
                        retry_after: Duration::from_millis(100),
                    });
                }
                if self
                    .active_count
                    .compare_exchange(active, active + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    break self.active_count.clone();
                }
            }
        };
        struct ActiveGuard(Arc<AtomicUsize>);
        impl Drop for ActiveGuard {
            fn drop(&mut self) {
                self.0.fetch_sub(1, Ordering::AcqRel);
            }
        }
        let _guard = ActiveGuard(permit);

        let start = Instant::now();
        let providers = self.select_providers(query).await;
        let provider_names: Vec<String> = providers.iter().map(|p| p.name().to_string()).collect();

        self.events.emit(
            Event::new(EventType::ProvidersQueried, "seeker")
                .with_metadata(serde_json::json!({ "providers": provider_names })),
        );

        let timeout_duration =
            Duration::from_millis(query.timeout_ms).min(self.config.default_timeout());
        let cancellation = CancellationToken::new();
        let raw_results = self
            .fan_out(query, providers, timeout_duration, cancellation)
            .await;

        let total_found: usize = raw_results.iter().map(Vec::len).sum();
        let flattened: Vec<SearchResult> = raw_results.into_iter().flatten().collect();

        let (processed, filtered) = self.processor.process(query, flattened);

        self.events.emit(Event::new(EventType::ResultsProcessed, "seeker"));

        let confidence = KnowledgeResponse::compute_confidence(&processed, provider_names.len());
        let summary = KnowledgeResponse::summarize(&query.query, &processed);
        let sources_used: HashSet<String> = processed.iter().map(|r| r.domain.clone()).collect();

        let response = KnowledgeResponse {
            query: query.query.clone(),
            results: processed,
            summary,
            confidence,
            sources_used,
            verification_results: None,
            metadata: ResponseMetadata {
                total_results_found: total_found,
                results_filtered: filtered,
                processing_time_ms: start.elapsed().as_millis() as u64,
                cache_used: false,
                providers_queried: provider_names,
                verified_count: None,
            },
            responded_at: chrono::Utc::now(),
        };

        if self.config.cache_enabled {
            let key = cache_key(query);
            self.cache.put(key, response.clone(), query.priority).await;
        }

        self.events.emit(Event::new(EventType::ResponseReady, "seeker"));
        Ok(response)
    }

    /// Prioritize and batch a list of queries, respecting
    /// `max_concurrent_searches`.
    pub async fn process_queries(
        &self,
        mut queries: Vec<KnowledgeQuery>,
    ) -> Vec<Result<KnowledgeResponse, Error>> {
        queries.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank()));
        let batch_size = self.config.max_concurrent_searches.max(1);
        let mut responses = Vec::with_capacity(queries.len());

        for batch in queries.chunks(batch_size) {
            let futures = batch.iter().cloned().map(|q| self.process_query(q));
            responses.extend(join_all(futures).await);
        }
        responses
    }

    pub async fn status(&self) -> SeekerStatus {
        let providers = self.registry.all().await;
        let mut statuses = Vec::with_capacity(providers.len());
        let health_manager = HealthCheckManager::new();
        for provider in &providers {
            statuses.push(ProviderStatus {
                name: provider.name().to_string(),
                available: provider.is_available().await,
            });
            health_manager
                .register(Arc::new(ProviderHealthCheck(provider.clone())))
                .await;
        }
        let system_health = health_manager.get_system_health().await;
        let cache_stats = self.cache.stats().await;
        SeekerStatus {
            enabled: self.config.enabled,
            providers: statuses,
            cache_size: cache_stats.size,
            cache_hit_rate: cache_stats.hit_rate(),
            system_health,
        }
    }

    pub async fn clear_caches(&self) {
        self.cache.clear().await;
    }

    async fn select_providers(&self, query: &KnowledgeQuery) -> Vec<Arc<dyn SearchProvider>> {
        let mut providers = self.registry.all().await;

        if let Some(preferred) = &query.preferred_sources {
            providers.retain(|p| preferred.contains(p.name()));
        }

        let mut available = Vec::new();
        for provider in providers {
            if provider.is_available().await {
                available.push(provider);
            }
        }

        available.retain(|p| provider_matches_query_type(p.kind(), query.query_type));
        available.sort_by(|a, b| b.priority().cmp(&a.priority()));
        available
    }

    /// Fan out to every selected provider concurrently, each wrapped in its
    /// own timeout. One provider's failure or timeout never cancels the
    /// others ("settled" semantics).
    async fn fan_out(
        &self,
        query: &KnowledgeQuery,
        providers: Vec<Arc<dyn SearchProvider>>,
        timeout_duration: Duration,
        cancellation: CancellationToken,
    ) -> Vec<Vec<SearchResult>> {
        let gate = self.concurrency_gate.clone();
        let cap = self.config.max_results_per_provider;
        let tasks: Vec<_> = providers
            .into_iter()
            .map(|provider| {
                let query = query.clone();
                let gate = gate.clone();
                let cancellation = cancellation.clone();
                let events = self.events.clone();
                tokio::spawn(async move {
                    let _permit = gate.acquire().await.ok()?;
                    let name = provider.name().to_string();
                    let outcome = tokio::select! {
                        result = tokio::time::timeout(timeout_duration, provider.search(&query)) => result,
                        _ = cancellation.cancelled() => return None,
                    };
                    match outcome {
                        Ok(Ok(mut results)) => {
                            results.truncate(cap);
                            Some(results)
                        }
                        Ok(Err(err)) => {
                            warn!(provider = %name, error = %err, "provider search failed");
                            events.emit(
                                Event::new(EventType::ProviderFailed, "seeker")
                                    .with_severity(Severity::Warning)
                                    .with_metadata(serde_json::json!({
                                        "provider": name,
                                        "error": err.to_string(),
                                    })),
                            );
                            None
                        }
                        Err(_) => {
                            debug!(provider = %name, "provider search timed out");
                            None
                        }
                    }
                })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(Some(provider_results)) => results.push(provider_results),
                Ok(None) => {}
                Err(join_err) => {
                    warn!(error = %join_err, "provider task panicked");
                }
            }
        }
        results
    }

    fn empty_response(&self, query: &KnowledgeQuery, providers_queried: Vec<String>) -> KnowledgeResponse {
        KnowledgeResponse {
            query: query.query.clone(),
            results: Vec::new(),
            summary: format!("No relevant information found for \"{}\".", query.query),
            confidence: 0.0,
            sources_used: HashSet::new(),
            verification_results: None,
            metadata: ResponseMetadata {
                total_results_found: 0,
                results_filtered: 0,
                processing_time_ms: 0,
                cache_used: false,
                providers_queried,
                verified_count: None,
            },
            responded_at: chrono::Utc::now(),
        }
    }
}

fn provider_matches_query_type(kind: crate::providers::ProviderKind, query_type: QueryType) -> bool {
    use crate::providers::ProviderKind;
    match query_type {
        QueryType::Technical => {
            matches!(kind, ProviderKind::DocumentationSearch | ProviderKind::WebSearch | ProviderKind::Mock)
        }
        QueryType::Factual | QueryType::Explanatory => {
            matches!(kind, ProviderKind::WebSearch | ProviderKind::Mock)
        }
        QueryType::Comparative | QueryType::Trend => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProcessorConfig, ProviderConfig, RateLimitConfig};
    use crate::domain::{Priority, QueryMetadata, QueryType};
    use crate::providers::mock::FixtureResult;
    use crate::providers::MockProvider;
    use std::collections::HashMap as StdHashMap;

    async fn seeker_with_mock(fixtures: Vec<FixtureResult>) -> KnowledgeSeeker {
        let registry = Arc::new(ProviderRegistry::new());
        let provider = Arc::new(
            MockProvider::new(ProviderConfig {
                name: "mock".into(),
                kind: "mock".into(),
                base_url: None,
                api_key: None,
                enabled: true,
                priority: 50,
                rate_limit: RateLimitConfig::default(),
                limits: Default::default(),
                options: Default::default(),
            })
            .with_fixture("rust async", fixtures),
        );
        registry.register(provider).await;

        KnowledgeSeeker::new(
            SeekerConfig::default(),
            registry,
            InformationProcessor::new(ProcessorConfig::default()),
            Arc::new(ResponseCache::new(Duration::from_secs(60))),
            crate::events::null_sink(),
        )
    }

    fn query(text: &str) -> KnowledgeQuery {
        KnowledgeQuery {
            id: uuid::Uuid::new_v4().to_string(),
            query: text.into(),
            query_type: QueryType::Factual,
            max_results: 5,
            relevance_threshold: 0.1,
            timeout_ms: 5000,
            preferred_sources: None,
            filters: None,
            priority: Priority::Medium,
            context: StdHashMap::new(),
            metadata: QueryMetadata::default(),
        }
    }

    #[tokio::test]
    async fn happy_path_returns_ranked_results() {
        let seeker = seeker_with_mock(vec![
            FixtureResult {
                title: "Rust Async Guide".into(),
                url: "https://a.com".into(),
                content: "rust async patterns".into(),
                relevance_score: 0.9,
                credibility_score: 0.8,
            },
            FixtureResult {
                title: "Unrelated".into(),
                url: "https://b.com".into(),
                content: "nothing relevant".into(),
                relevance_score: 0.3,
                credibility_score: 0.5,
            },
        ])
        .await;

        let response = seeker.process_query(query("rust async")).await.unwrap();
        assert!(!response.results.is_empty());
        assert!(!response.metadata.cache_used);
    }

    #[tokio::test]
    async fn cache_hit_on_second_identical_query() {
        let seeker = seeker_with_mock(vec![FixtureResult {
            title: "Rust Async Guide".into(),
            url: "https://a.com".into(),
            content: "rust async patterns".into(),
            relevance_score: 0.9,
            credibility_score: 0.8,
        }])
        .await;

        let first = seeker.process_query(query("rust async")).await.unwrap();
        assert!(!first.metadata.cache_used);

        let mut q2 = query("rust async");
        q2.id = uuid::Uuid::new_v4().to_string();
        let second = seeker.process_query(q2).await.unwrap();
        assert!(second.metadata.cache_used);
    }

    #[tokio::test]
    async fn invalid_query_is_rejected() {
        let seeker = seeker_with_mock(vec![]).await;
        let mut bad = query("");
        bad.query = "   ".into();
        let result = seeker.process_query(bad).await;
        assert!(matches!(result, Err(Error::InvalidQuery { .. })));
    }

    #[tokio::test]
    async fn all_providers_failing_yields_empty_but_successful_response() {
        let registry = Arc::new(ProviderRegistry::new());
        let provider = Arc::new(MockProvider::new(ProviderConfig {
            name: "mock".into(),
            kind: "mock".into(),
            base_url: None,
            api_key: None,
            enabled: true,
            priority: 50,
            rate_limit: RateLimitConfig::default(),
            limits: Default::default(),
            options: Default::default(),
        }));
        provider.fail_next_call("down");
        registry.register(provider).await;

        let seeker = KnowledgeSeeker::new(
            SeekerConfig::default(),
            registry,
            InformationProcessor::new(ProcessorConfig::default()),
            Arc::new(ResponseCache::new(Duration::from_secs(60))),
            crate::events::null_sink(),
        );

        let response = seeker.process_query(query("anything")).await.unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.confidence, 0.0);
    }
}
