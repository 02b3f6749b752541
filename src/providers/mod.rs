//! The search provider abstraction (C1): a uniform contract across
//! heterogeneous backends, with a registry replacing the string-switch
//! dispatch the spec called out for re-architecture, and a shared
//! [`ProviderRuntime`] replacing an inheritance chain with composition.

pub mod academic_xml;
pub mod free_search;
pub mod mock;
pub mod web_search;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::{ProviderConfig, RateLimitConfig, SeekerConfig};
use crate::domain::{KnowledgeQuery, SearchResult};
use crate::error::{Error, Result};
use crate::moving_average::MovingAverage;
use crate::rate_limiter::{RateLimitDecision, RateLimiter};
use crate::resilience::circuit_breaker::{CircuitBreakerConfig, CircuitState};
use crate::resilience::retry::retry_with_policy;
use crate::resilience::{CircuitBreaker, RetryPolicy, RetrySettings};
use std::future::Future;

pub use academic_xml::AcademicXmlProvider;
pub use free_search::FreeSearchProvider;
pub use mock::MockProvider;
pub use web_search::WebSearchProvider;

/// The kind of backend a provider talks to; drives default query-type
/// filtering in the Seeker's provider selection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    WebSearch,
    AcademicSearch,
    DocumentationSearch,
    Mock,
}

#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub available: bool,
    pub response_time_ms_ema: f64,
    pub error_rate_ema: f64,
    pub last_error: Option<String>,
    pub total_requests: u64,
    pub total_errors: u64,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            available: true,
            response_time_ms_ema: 0.0,
            error_rate_ema: 0.0,
            last_error: None,
            total_requests: 0,
            total_errors: 0,
        }
    }
}

/// Shared machinery embedded by every concrete provider: rate limiting,
/// health tracking, and an HTTP client. This replaces a
/// `BaseSearchProvider` inheritance chain with composition, per the
/// "flatten inheritance" guidance — concrete providers hold one of these
/// and implement [`SearchProvider`] directly instead of subclassing.
pub struct ProviderRuntime {
    pub client: reqwest::Client,
    pub rate_limiter: RateLimiter,
    pub circuit_breaker: Arc<CircuitBreaker>,
    retry_policy: RetryPolicy,
    circuit_breaker_enabled: bool,
    name: String,
    health: RwLock<ProviderHealth>,
    response_time_ema: RwLock<MovingAverage>,
    error_rate_ema: RwLock<MovingAverage>,
}

impl ProviderRuntime {
    pub fn new(name: &str, rate_limit: RateLimitConfig, retry: RetrySettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            rate_limiter: RateLimiter::new(rate_limit),
            circuit_breaker: Arc::new(CircuitBreaker::new(name, CircuitBreakerConfig::default())),
            retry_policy: RetryPolicy::from_retry_settings(&retry),
            circuit_breaker_enabled: retry.circuit_breaker_enabled,
            name: name.to_string(),
            health: RwLock::new(ProviderHealth::default()),
            response_time_ema: RwLock::new(MovingAverage::new(0.1)),
            error_rate_ema: RwLock::new(MovingAverage::new(0.1)),
        }
    }

    /// Run `operation` under this provider's retry policy (§7: `NetworkError`
    /// is retried with backoff before degrading to `ProviderUnavailable`),
    /// wrapped in the circuit breaker when `circuit_breaker_enabled` is set.
    /// Exhausting all attempts on a transient error converts it to
    /// `ProviderUnavailable` so the Seeker's failure policy treats it the
    /// same as any other locally-recovered provider exclusion.
    pub async fn retry<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let run_with_retry = || retry_with_policy(&operation, &self.retry_policy, &self.name);

        let outcome = if self.circuit_breaker_enabled {
            self.circuit_breaker.call(run_with_retry).await
        } else {
            run_with_retry().await
        };

        outcome.map_err(|err| match err {
            Error::NetworkError { provider, message } => Error::ProviderUnavailable {
                provider,
                reason: format!("network error after retries: {message}"),
            },
            other => other,
        })
    }

    pub async fn check_rate_limit(&self) -> RateLimitDecision {
        self.rate_limiter.check().await
    }

    /// Run `operation` under the full provider lifecycle: rate-limit check,
    /// retry/circuit-breaker, then health/rate-limiter bookkeeping on the
    /// outcome. Every concrete provider's `search` funnels through this
    /// instead of repeating the check → retry → record sequence itself.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let RateLimitDecision::Throttled { retry_after } = self.check_rate_limit().await {
            return Err(Error::RateLimitExceeded {
                provider: self.name.clone(),
                retry_after,
            });
        }

        let start = Instant::now();
        match self.retry(operation).await {
            Ok(value) => {
                self.record_success(start.elapsed()).await;
                Ok(value)
            }
            Err(err) => {
                let rate_limited = matches!(err, Error::RateLimitExceeded { .. });
                self.record_failure(&err.to_string(), rate_limited).await;
                Err(err)
            }
        }
    }

    pub async fn record_success(&self, elapsed: Duration) {
        self.rate_limiter.observe_success().await;
        let response_time_ms = self.response_time_ema.write().await.record(elapsed.as_millis() as f64);
        let error_rate = self.error_rate_ema.write().await.record(0.0);
        let mut health = self.health.write().await;
        health.available = true;
        health.last_error = None;
        health.response_time_ms_ema = response_time_ms;
        health.error_rate_ema = error_rate;
        health.total_requests += 1;
    }

    pub async fn record_failure(&self, error: &str, rate_limited: bool) {
        if rate_limited {
            self.rate_limiter.observe_rate_limited().await;
        }
        let error_rate = self.error_rate_ema.write().await.record(1.0);
        let mut health = self.health.write().await;
        health.available = false;
        health.last_error = Some(error.to_string());
        health.error_rate_ema = error_rate;
        health.total_requests += 1;
        health.total_errors += 1;
    }

    pub async fn health(&self) -> ProviderHealth {
        self.health.read().await.clone()
    }

    pub async fn is_available(&self) -> bool {
        if self.circuit_breaker_enabled
            && matches!(self.circuit_breaker.get_state().await, CircuitState::Open { .. })
        {
            return false;
        }
        self.rate_limiter.is_available().await
    }
}

/// The uniform contract every concrete search provider implements.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> ProviderKind;
    fn priority(&self) -> u8 {
        50
    }

    /// Execute one query against this provider's backend, returning
    /// normalized results. Implementations are responsible for honoring
    /// `query.timeout_ms` themselves or relying on the caller's timeout
    /// wrapper; either is acceptable since the Seeker always wraps the
    /// call in its own timeout as a backstop.
    async fn search(&self, query: &KnowledgeQuery) -> Result<Vec<SearchResult>, Error>;

    async fn is_available(&self) -> bool;

    async fn health(&self) -> ProviderHealth;
}

/// A read-mostly registry of configured providers, replacing a
/// string-switch dispatch with lookup over trait objects.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn SearchProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, provider: Arc<dyn SearchProvider>) {
        self.providers
            .write()
            .await
            .insert(provider.name().to_string(), provider);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn SearchProvider>> {
        self.providers.read().await.get(name).cloned()
    }

    pub async fn all(&self) -> Vec<Arc<dyn SearchProvider>> {
        self.providers.read().await.values().cloned().collect()
    }
}

/// Build a registry from configuration entries, constructing the concrete
/// provider for each recognized `kind`. `seeker`'s retry/circuit-breaker
/// settings are shared by every network-backed provider's runtime.
pub async fn build_registry(
    configs: &[ProviderConfig],
    seeker: &SeekerConfig,
) -> Result<ProviderRegistry, Error> {
    let retry = RetrySettings {
        attempts: seeker.retry_attempts,
        initial_delay_ms: seeker.retry_delay_ms,
        circuit_breaker_enabled: seeker.circuit_breaker_enabled,
    };
    let registry = ProviderRegistry::new();
    for cfg in configs.iter().filter(|c| c.enabled) {
        let provider: Arc<dyn SearchProvider> = match cfg.kind.as_str() {
            "web_search" => Arc::new(WebSearchProvider::new(cfg.clone(), retry)),
            "free_search" => Arc::new(FreeSearchProvider::new(cfg.clone(), retry)),
            "academic_xml" => Arc::new(AcademicXmlProvider::new(cfg.clone(), retry)),
            "mock" => Arc::new(MockProvider::new(cfg.clone())),
            other => {
                return Err(Error::Configuration(format!(
                    "unknown provider kind: {other}"
                )))
            }
        };
        registry.register(provider).await;
    }
    Ok(registry)
}
