use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::query::ContentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Web,
    Academic,
    News,
    Documentation,
    Social,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Unreliable,
    Low,
    Medium,
    High,
}

impl Quality {
    /// Map a combined relevance/credibility score onto a quality tier.
    pub fn from_combined_score(combined: f64) -> Self {
        if combined >= 0.8 {
            Quality::High
        } else if combined >= 0.6 {
            Quality::Medium
        } else if combined >= 0.3 {
            Quality::Low
        } else {
            Quality::Unreliable
        }
    }
}

/// One normalized result produced by a search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub query_id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub domain: String,
    pub source_type: SourceType,
    pub content_type: ContentType,
    pub relevance_score: f64,
    pub credibility_score: f64,
    pub quality: Quality,
    pub published_at: Option<DateTime<Utc>>,
    pub retrieved_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub provider: String,
    /// The provider's configured selection priority, carried through so
    /// ranking can use it as a final tie-break (see `compare_for_ranking`).
    #[serde(default)]
    pub provider_priority: u8,
    #[serde(default)]
    pub provider_metadata: serde_json::Value,
    pub content_hash: String,
}

/// Extract the host from a URL, falling back to `"unknown"` when it cannot
/// be parsed or has no host component.
pub fn domain_of(raw_url: &str) -> String {
    url::Url::parse(raw_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

/// A stable, deterministic fingerprint over the fields that define result
/// identity for deduplication purposes. Any non-cryptographic hash with
/// these properties would satisfy the contract; SHA-256 is used here
/// because the crate already links it for file-integrity checks elsewhere.
pub fn content_hash(title: &str, url: &str, content: &str) -> String {
    let domain = domain_of(url);
    let snippet: String = content.chars().take(100).collect();
    let basis = format!(
        "{}|{}|{}",
        title.trim().to_lowercase(),
        domain.to_lowercase(),
        snippet.trim().to_lowercase()
    );
    let mut hasher = Sha256::new();
    hasher.update(basis.as_bytes());
    let digest = hasher.finalize();
    hex_encode(&digest[..16])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Deduplication signature: domain + normalized title + snippet prefix.
/// Equivalent in spirit to `content_hash` but kept separate so callers can
/// choose whichever matches their data (e.g. when a provider already
/// supplies its own id but no full content).
pub fn dedup_signature(result: &SearchResult) -> String {
    content_hash(&result.title, &result.url, &result.content)
}
