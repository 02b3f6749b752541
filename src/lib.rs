//! Knowledge Seeker - multi-provider search orchestration for autonomous
//! agent task research.
//!
//! This crate queries multiple search providers in parallel, scores and
//! filters the results for relevance and credibility, caches responses, and
//! can automatically decide whether a task needs research before attaching
//! findings to it.

pub mod augmenter;
pub mod cache;
pub mod config;
pub mod detector;
pub mod domain;
pub mod error;
pub mod events;
pub mod moving_average;
pub mod processor;
pub mod provenance;
pub mod providers;
pub mod rate_limiter;
pub mod resilience;
pub mod seeker;

pub use augmenter::TaskResearchAugmenter;
pub use cache::ResponseCache;
pub use config::{Config, ConfigOverrides};
pub use detector::ResearchDetector;
pub use domain::{
    AugmentedTask, ContentType, KnowledgeQuery, KnowledgeResponse, Priority, QueryFilters,
    QueryMetadata, QueryType, ResearchContext, ResearchRequirement, SearchResult, SourceType,
    Task,
};
pub use error::{Error, Result};
pub use events::{Event, EventSink, EventType, NullEventSink};
pub use processor::InformationProcessor;
pub use provenance::ProvenanceLog;
pub use providers::{ProviderRegistry, SearchProvider};
pub use rate_limiter::RateLimiter;
pub use resilience::{CircuitBreaker, RetryConfig, RetryPolicy, TimeoutConfig, TimeoutExt};
pub use seeker::KnowledgeSeeker;
