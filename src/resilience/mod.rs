pub mod circuit_breaker;
pub mod health;
pub mod retry;
pub mod timeout;


pub use circuit_breaker::CircuitBreaker;
pub use health::{
    ComponentHealth, HealthCheck, HealthCheckManager, HealthStatus, HttpHealthCheck,
    PingHealthCheck,
};
pub use retry::{retry, retry_with_policy, RetryConfig, RetryPolicy, RetrySettings, RetryableOperation};
pub use timeout::{TimeoutConfig, TimeoutExt};
