//! Layered configuration for the knowledge-seeking subsystem.
//!
//! Configuration is assembled once at startup from (in increasing
//! precedence) built-in defaults, an optional TOML file, and environment
//! variables prefixed `KNOWLEDGE_SEEKER_`. No component reads the
//! environment directly; everything is handed a fully-resolved [`Config`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration handed to the Seeker, Processor, Detector, and
/// Augmenter at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub seeker: SeekerConfig,
    pub providers: Vec<ProviderConfig>,
    pub processor: ProcessorConfig,
    pub cache: CacheConfig,
    pub detector: DetectorConfig,
    pub augmenter: AugmenterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seeker: SeekerConfig::default(),
            providers: Vec::new(),
            processor: ProcessorConfig::default(),
            cache: CacheConfig::default(),
            detector: DetectorConfig::default(),
            augmenter: AugmenterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekerConfig {
    pub enabled: bool,
    pub default_timeout_ms: u64,
    pub max_concurrent_searches: usize,
    pub max_results_per_provider: usize,
    pub min_relevance_threshold: f64,
    pub cache_enabled: bool,
    pub cache_ttl_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub circuit_breaker_enabled: bool,
}

impl Default for SeekerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_timeout_ms: 10_000,
            max_concurrent_searches: 10,
            max_results_per_provider: 10,
            min_relevance_threshold: 0.3,
            cache_enabled: true,
            cache_ttl_ms: 3_600_000,
            retry_attempts: 3,
            retry_delay_ms: 500,
            circuit_breaker_enabled: true,
        }
    }
}

impl SeekerConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub burst_limit: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 30,
            requests_per_hour: 1000,
            burst_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderLimits {
    pub max_results_per_query: usize,
    pub max_concurrent_queries: usize,
}

impl Default for ProviderLimits {
    fn default() -> Self {
        Self {
            max_results_per_query: 10,
            max_concurrent_queries: 5,
        }
    }
}

/// One configured provider instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub enabled: bool,
    pub priority: u8,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub limits: ProviderLimits,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityConfig {
    pub min_sources: usize,
    pub min_source_types: usize,
    pub max_results_per_domain: usize,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            min_sources: 1,
            min_source_types: 1,
            max_results_per_domain: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub enable_credibility_scoring: bool,
    pub enable_relevance_filtering: bool,
    pub enable_duplicate_detection: bool,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            enable_credibility_scoring: true,
            enable_relevance_filtering: true,
            enable_duplicate_detection: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub min_relevance_score: f64,
    pub min_credibility_score: f64,
    pub max_results_to_process: usize,
    pub diversity: DiversityConfig,
    pub quality: QualityConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            min_relevance_score: 0.3,
            min_credibility_score: 0.2,
            max_results_to_process: 50,
            diversity: DiversityConfig::default(),
            quality: QualityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enable_result_caching: bool,
    pub cache_ttl_ms: u64,
    pub max_cache_size: usize,
    pub durable_path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_result_caching: true,
            cache_ttl_ms: 3_600_000,
            max_cache_size: 100,
            durable_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub min_confidence: f64,
    pub max_queries: usize,
    pub enable_question_detection: bool,
    pub enable_uncertainty_detection: bool,
    pub enable_comparison_detection: bool,
    pub enable_technical_detection: bool,
    pub enable_fact_checking_detection: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            max_queries: 3,
            enable_question_detection: true,
            enable_uncertainty_detection: true,
            enable_comparison_detection: true,
            enable_technical_detection: true,
            enable_fact_checking_detection: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmenterConfig {
    pub max_results_per_query: usize,
    pub relevance_threshold: f64,
    pub timeout_ms: u64,
    pub max_queries: usize,
    pub enable_caching: bool,
}

impl Default for AugmenterConfig {
    fn default() -> Self {
        Self {
            max_results_per_query: 3,
            relevance_threshold: 0.8,
            timeout_ms: 5_000,
            max_queries: 3,
            enable_caching: true,
        }
    }
}

/// Explicit overrides applied on top of a loaded [`Config`], mirroring the
/// shape of environment-variable overrides so callers can apply the same
/// knobs programmatically (e.g. in tests).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    pub seeker_enabled: Option<bool>,
    pub cache_enabled: Option<bool>,
    pub max_concurrent_searches: Option<usize>,
}

impl Config {
    /// The conventional per-user config file location (`$XDG_CONFIG_HOME` or
    /// platform equivalent), used when the caller doesn't name a path
    /// explicitly. Falls back to a relative filename if the platform config
    /// directory can't be resolved.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("knowledge_seeker").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("knowledge_seeker.toml"))
    }

    /// Load configuration by merging (in order of increasing precedence) a
    /// TOML file at `path` and `KNOWLEDGE_SEEKER_`-prefixed environment
    /// variables on top of built-in defaults.
    ///
    /// Missing file and missing environment variables are not errors; only
    /// malformed content is.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        }

        let merged = builder
            .add_source(config::Environment::with_prefix("KNOWLEDGE_SEEKER").separator("__"))
            .build()?;

        let mut cfg: Self = merged.try_deserialize()?;
        if let Ok(env_overrides) = envy::prefixed("KNOWLEDGE_SEEKER_").from_env::<ConfigOverrides>()
        {
            cfg.apply_overrides(&env_overrides);
        }
        Ok(cfg)
    }

    /// Apply explicit overrides on top of this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(enabled) = overrides.seeker_enabled {
            self.seeker.enabled = enabled;
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.seeker.cache_enabled = enabled;
            self.cache.enable_result_caching = enabled;
        }
        if let Some(max) = overrides.max_concurrent_searches {
            self.seeker.max_concurrent_searches = max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert!(cfg.seeker.enabled);
        assert_eq!(cfg.seeker.max_concurrent_searches, 10);
        assert_eq!(cfg.processor.diversity.max_results_per_domain, 3);
    }

    #[test]
    fn overrides_apply() {
        let mut cfg = Config::default();
        let overrides = ConfigOverrides {
            seeker_enabled: Some(false),
            cache_enabled: None,
            max_concurrent_searches: Some(2),
        };
        cfg.apply_overrides(&overrides);
        assert!(!cfg.seeker.enabled);
        assert_eq!(cfg.seeker.max_concurrent_searches, 2);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let cfg = Config::load("/nonexistent/path/config.toml").unwrap();
        assert_eq!(cfg.seeker.max_concurrent_searches, 10);
    }
}
