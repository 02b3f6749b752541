//! Response Cache (C4): a deterministic key → [`KnowledgeResponse`] map
//! with TTL expiry, priority-scaled retention, and an optional durable
//! backing layer that degrades gracefully when unavailable.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::{KnowledgeQuery, KnowledgeResponse, Priority};

const DEFAULT_TTL: Duration = Duration::from_secs(3600);
const SIZE_SWEEP_THRESHOLD: usize = 100;

#[derive(Clone)]
struct CacheEntry {
    response: KnowledgeResponse,
    stored_at: Instant,
    ttl: Duration,
    access_count: u64,
    last_accessed: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub total_accesses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_accesses as f64
        }
    }
}

/// Compute a deterministic cache key from the parameters that define query
/// identity: normalized text, type, result cap, threshold, and sorted
/// preferred sources.
pub fn cache_key(query: &KnowledgeQuery) -> String {
    let normalized = query.query.trim().to_lowercase();
    let mut preferred: Vec<String> = query
        .preferred_sources
        .as_ref()
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default();
    preferred.sort();

    let basis = format!(
        "{}|{:?}|{}|{}|{}",
        normalized,
        query.query_type,
        query.max_results,
        query.relevance_threshold,
        preferred.join(",")
    );
    let mut hasher = Sha256::new();
    hasher.update(basis.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Optional durable backing layer. Degrades to a no-op if it could not be
/// opened (permissions, corruption), per the "operate degraded without
/// raising an error" requirement.
struct DurableLayer {
    tree: sled::Db,
}

impl DurableLayer {
    fn open(path: &Path) -> Option<Self> {
        match sled::open(path) {
            Ok(tree) => Some(Self { tree }),
            Err(err) => {
                warn!(error = %err, path = %path.display(), "failed to open durable cache, running in-memory only");
                None
            }
        }
    }

    fn get(&self, key: &str) -> Option<KnowledgeResponse> {
        let raw = self.tree.get(key).ok()??;
        bincode::deserialize(&raw).ok()
    }

    fn put(&self, key: &str, response: &KnowledgeResponse) {
        if let Ok(encoded) = bincode::serialize(response) {
            let _ = self.tree.insert(key, encoded);
        }
    }

    fn clear(&self) {
        let _ = self.tree.clear();
    }
}

/// In-memory response cache with an optional durable layer.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    durable: Option<DurableLayer>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            durable: None,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_durable(default_ttl: Duration, path: impl AsRef<Path>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            durable: DurableLayer::open(path.as_ref()),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, key: &str) -> Option<KnowledgeResponse> {
        {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(key) {
                if entry.is_expired() {
                    entries.remove(key);
                } else {
                    entry.access_count += 1;
                    entry.last_accessed = Instant::now();
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    let mut response = entry.response.clone();
                    response.metadata.cache_used = true;
                    return Some(response);
                }
            }
        }

        if let Some(durable) = &self.durable {
            if let Some(mut response) = durable.get(key) {
                response.metadata.cache_used = true;
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.entries.write().await.insert(
                    key.to_string(),
                    CacheEntry {
                        response: response.clone(),
                        stored_at: Instant::now(),
                        ttl: self.default_ttl,
                        access_count: 1,
                        last_accessed: Instant::now(),
                    },
                );
                return Some(response);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub async fn put(&self, key: String, response: KnowledgeResponse, priority: Priority) {
        let ttl = if priority == Priority::Critical {
            self.default_ttl * 2
        } else {
            self.default_ttl
        };

        if let Some(durable) = &self.durable {
            durable.put(&key, &response);
        }

        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                response,
                stored_at: Instant::now(),
                ttl,
                access_count: 0,
                last_accessed: Instant::now(),
            },
        );

        if entries.len() > SIZE_SWEEP_THRESHOLD {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired());
            debug!(before, after = entries.len(), "swept expired cache entries");
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
        if let Some(durable) = &self.durable {
            durable.clear();
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let size = self.entries.read().await.len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            size,
            hits,
            misses,
            total_accesses: hits + misses,
        }
    }

    pub async fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{KnowledgeQuery, QueryMetadata, QueryType, ResponseMetadata};
    use chrono::Utc;
    use proptest::prelude::*;
    use std::collections::{HashMap as StdHashMap, HashSet};

    fn query() -> KnowledgeQuery {
        KnowledgeQuery {
            id: "q1".into(),
            query: "Rust Async".into(),
            query_type: QueryType::Technical,
            max_results: 5,
            relevance_threshold: 0.5,
            timeout_ms: 5000,
            preferred_sources: None,
            filters: None,
            priority: Priority::Medium,
            context: StdHashMap::new(),
            metadata: QueryMetadata::default(),
        }
    }

    fn response() -> KnowledgeResponse {
        KnowledgeResponse {
            query: "rust async".into(),
            results: Vec::new(),
            summary: "none".into(),
            confidence: 0.0,
            sources_used: HashSet::new(),
            verification_results: None,
            metadata: ResponseMetadata::default(),
            responded_at: Utc::now(),
        }
    }

    #[test]
    fn cache_key_is_case_and_whitespace_insensitive() {
        let mut q1 = query();
        let mut q2 = query();
        q1.query = "  Rust Async  ".into();
        q2.query = "rust async".into();
        assert_eq!(cache_key(&q1), cache_key(&q2));
    }

    #[test]
    fn cache_key_differs_on_max_results() {
        let mut q1 = query();
        let mut q2 = query();
        q2.max_results = 10;
        assert_ne!(cache_key(&q1), cache_key(&q2));
    }

    #[tokio::test]
    async fn put_then_get_is_a_hit() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let key = cache_key(&query());
        cache.put(key.clone(), response(), Priority::Medium).await;
        let hit = cache.get(&key).await;
        assert!(hit.is_some());
        assert!(hit.unwrap().metadata.cache_used);
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = ResponseCache::new(Duration::from_millis(10));
        let key = cache_key(&query());
        cache.put(key.clone(), response(), Priority::Medium).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let key = cache_key(&query());
        assert!(cache.get(&key).await.is_none());
        cache.put(key.clone(), response(), Priority::Medium).await;
        assert!(cache.get(&key).await.is_some());
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn clear_removes_all_entries() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let key = cache_key(&query());
        cache.put(key.clone(), response(), Priority::Medium).await;
        cache.clear().await;
        assert!(cache.get(&key).await.is_none());
    }

    proptest! {
        #[test]
        fn cache_key_ignores_case_and_surrounding_whitespace(
            text in "[a-zA-Z]{1,20}( [a-zA-Z]{1,20}){0,3}",
            leading in 0usize..5,
            trailing in 0usize..5,
        ) {
            let mut padded = query();
            padded.query = format!("{}{}{}", " ".repeat(leading), text.to_uppercase(), " ".repeat(trailing));
            let mut normalized = query();
            normalized.query = text.to_lowercase();
            prop_assert_eq!(cache_key(&padded), cache_key(&normalized));
        }

        #[test]
        fn cache_key_is_deterministic_for_repeated_calls(
            text in "[a-zA-Z0-9 ]{1,40}",
            max_results in 1usize..50,
        ) {
            let mut q = query();
            q.query = text;
            q.max_results = max_results;
            prop_assert_eq!(cache_key(&q), cache_key(&q));
        }
    }
}

pub const DEFAULT_CACHE_TTL: Duration = DEFAULT_TTL;
