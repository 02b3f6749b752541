use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use knowledge_seeker::cache::{cache_key, ResponseCache};
use knowledge_seeker::domain::{
    KnowledgeQuery, KnowledgeResponse, Priority, QueryMetadata, QueryType, ResponseMetadata,
};

fn sample_query(id: &str) -> KnowledgeQuery {
    KnowledgeQuery {
        id: id.to_string(),
        query: "rust async runtime comparison".to_string(),
        query_type: QueryType::Comparative,
        max_results: 10,
        relevance_threshold: 0.3,
        timeout_ms: 5_000,
        preferred_sources: None,
        filters: None,
        priority: Priority::Medium,
        context: HashMap::new(),
        metadata: QueryMetadata::default(),
    }
}

fn sample_response(query: &str) -> KnowledgeResponse {
    KnowledgeResponse {
        query: query.to_string(),
        results: Vec::new(),
        summary: format!("No relevant information found for \"{query}\"."),
        confidence: 0.0,
        sources_used: HashSet::new(),
        verification_results: None,
        metadata: ResponseMetadata::default(),
        responded_at: chrono::Utc::now(),
    }
}

/// Benchmarks the cache hit path against the P95 < 50ms target in
/// the response cache design (see ResponseCache::get).
fn benchmark_cache_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cache = ResponseCache::new(Duration::from_secs(3600));
    let query = sample_query("bench-1");
    let key = cache_key(&query);
    rt.block_on(cache.put(key.clone(), sample_response(&query.query), query.priority));

    c.bench_function("cache_get_hit", |b| {
        b.iter(|| rt.block_on(cache.get(black_box(&key))));
    });
}

fn benchmark_cache_key(c: &mut Criterion) {
    let query = sample_query("bench-2");
    c.bench_function("cache_key_generation", |b| {
        b.iter(|| black_box(cache_key(black_box(&query))));
    });
}

criterion_group!(benches, benchmark_cache_hit, benchmark_cache_key);
criterion_main!(benches);
