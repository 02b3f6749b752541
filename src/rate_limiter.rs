//! Per-provider rate limiting: sliding minute/hour request windows plus
//! exponential backoff triggered by upstream 429 responses.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLimitDecision {
    Allow,
    Throttled { retry_after: Duration },
}

#[derive(Debug)]
struct WindowState {
    requests_in_minute: u32,
    requests_in_hour: u32,
    minute_start: Instant,
    hour_start: Instant,
    backoff_until: Option<Instant>,
    current_backoff: Duration,
}

impl WindowState {
    fn new(now: Instant) -> Self {
        Self {
            requests_in_minute: 0,
            requests_in_hour: 0,
            minute_start: now,
            hour_start: now,
            backoff_until: None,
            current_backoff: Duration::from_millis(500),
        }
    }

    fn roll_windows(&mut self, now: Instant) {
        if now.duration_since(self.minute_start) >= Duration::from_secs(60) {
            self.requests_in_minute = 0;
            self.minute_start = now;
        }
        if now.duration_since(self.hour_start) >= Duration::from_secs(3600) {
            self.requests_in_hour = 0;
            self.hour_start = now;
        }
        if let Some(until) = self.backoff_until {
            if now >= until {
                self.backoff_until = None;
            }
        }
    }
}

/// Token-bucket-ish limiter over per-minute and per-hour windows, with
/// exponential backoff applied when the caller observes a rate-limit
/// response from the upstream provider.
pub struct RateLimiter {
    config: RateLimitConfig,
    backoff_multiplier: f64,
    max_backoff: Duration,
    state: Arc<Mutex<WindowState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(60),
            state: Arc::new(Mutex::new(WindowState::new(Instant::now()))),
        }
    }

    /// Check whether a request may proceed right now, incrementing the
    /// window counters when it does.
    pub async fn check(&self) -> RateLimitDecision {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.roll_windows(now);

        if let Some(until) = state.backoff_until {
            return RateLimitDecision::Throttled {
                retry_after: until.saturating_duration_since(now),
            };
        }

        if state.requests_in_minute >= self.config.requests_per_minute
            || state.requests_in_hour >= self.config.requests_per_hour
        {
            let retry_after = Duration::from_secs(60)
                .saturating_sub(now.duration_since(state.minute_start));
            debug!(retry_after_ms = retry_after.as_millis(), "rate limit window exhausted");
            return RateLimitDecision::Throttled { retry_after };
        }

        state.requests_in_minute += 1;
        state.requests_in_hour += 1;
        RateLimitDecision::Allow
    }

    /// Record an upstream rate-limit response (HTTP 429 or equivalent),
    /// doubling the current backoff window up to `max_backoff`.
    pub async fn observe_rate_limited(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let next = Duration::from_secs_f64(
            (state.current_backoff.as_secs_f64() * self.backoff_multiplier)
                .min(self.max_backoff.as_secs_f64()),
        );
        state.current_backoff = next;
        state.backoff_until = Some(now + next);
        warn!(backoff_ms = next.as_millis(), "provider reported rate limiting");
    }

    /// Clear any standing backoff after a successful call, without
    /// resetting the window counters.
    pub async fn observe_success(&self) {
        let mut state = self.state.lock().await;
        state.current_backoff = Duration::from_millis(500);
    }

    pub async fn is_available(&self) -> bool {
        matches!(self.check_without_consuming().await, RateLimitDecision::Allow)
    }

    async fn check_without_consuming(&self) -> RateLimitDecision {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.roll_windows(now);
        if let Some(until) = state.backoff_until {
            return RateLimitDecision::Throttled {
                retry_after: until.saturating_duration_since(now),
            };
        }
        if state.requests_in_minute >= self.config.requests_per_minute
            || state.requests_in_hour >= self.config.requests_per_hour
        {
            return RateLimitDecision::Throttled {
                retry_after: Duration::from_secs(1),
            };
        }
        RateLimitDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(per_minute: u32, per_hour: u32) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: per_minute,
            requests_per_hour: per_hour,
            burst_limit: None,
        }
    }

    #[tokio::test]
    async fn allows_requests_under_the_limit() {
        let limiter = RateLimiter::new(config(5, 100));
        for _ in 0..5 {
            assert_eq!(limiter.check().await, RateLimitDecision::Allow);
        }
    }

    #[tokio::test]
    async fn throttles_once_minute_window_is_exhausted() {
        let limiter = RateLimiter::new(config(2, 100));
        assert_eq!(limiter.check().await, RateLimitDecision::Allow);
        assert_eq!(limiter.check().await, RateLimitDecision::Allow);
        assert!(matches!(
            limiter.check().await,
            RateLimitDecision::Throttled { .. }
        ));
    }

    #[tokio::test]
    async fn observe_rate_limited_sets_a_backoff_window() {
        let limiter = RateLimiter::new(config(100, 1000));
        limiter.observe_rate_limited().await;
        assert!(matches!(
            limiter.check().await,
            RateLimitDecision::Throttled { .. }
        ));
    }

    #[tokio::test]
    async fn successive_rate_limit_observations_increase_backoff() {
        let limiter = RateLimiter::new(config(100, 1000));
        limiter.observe_rate_limited().await;
        let first = {
            let state = limiter.state.lock().await;
            state.current_backoff
        };
        limiter.observe_rate_limited().await;
        let second = {
            let state = limiter.state.lock().await;
            state.current_backoff
        };
        assert!(second > first);
    }
}
