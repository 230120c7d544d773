//! Hot path benchmarks: signature computation and sampling decisions.
//!
//! `should_sample` sits on the logging fast path of host applications, so
//! both the cold (normalize + hash) and warm (cache hit) costs matter.

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use logsift::core::{CacheConfig, Result, SamplerConfig, Severity};
use logsift::policy::SamplingPolicy;
use logsift::sampler::{AdaptiveSampler, PatternSink, PatternStats, PolicyStore};
use logsift::signature::{compute_signature, normalize};
use std::sync::Arc;

struct NullStore;

#[async_trait]
impl PolicyStore for NullStore {
    async fn get_active_policy(&self, _service: &str) -> Result<Option<SamplingPolicy>> {
        Ok(Some(SamplingPolicy::keep_all(1)))
    }
}

struct NullSink;

#[async_trait]
impl PatternSink for NullSink {
    async fn report_patterns(&self, _service: &str, _patterns: Vec<PatternStats>) -> Result<()> {
        Ok(())
    }
}

const MESSAGES: &[&str] = &[
    "User 48213 logged in from 10.14.2.88",
    "GET /api/v2/orders/550e8400-e29b-41d4-a716-446655440000 returned 200 in 12ms",
    "DatabaseError: connection timeout after 3000ms on replica db-07",
    "cache evicted 412 entries, 90211 bytes reclaimed",
    "payment 9921 settled for user jane@example.com at 2024-01-15T10:30:00Z",
];

fn bench_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    for (i, message) in MESSAGES.iter().enumerate() {
        group.bench_with_input(BenchmarkId::from_parameter(i), message, |b, message| {
            b.iter(|| normalize(black_box(message)));
        });
    }
    group.finish();
}

fn bench_signature(c: &mut Criterion) {
    c.bench_function("compute_signature", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % MESSAGES.len();
            compute_signature(black_box(MESSAGES[i]))
        });
    });
}

fn bench_should_sample(c: &mut Criterion) {
    let sampler = Arc::new(AdaptiveSampler::new(
        "bench",
        SamplerConfig::default(),
        &CacheConfig::default(),
        Arc::new(NullStore),
        Arc::new(NullSink),
    ));

    c.bench_function("should_sample_cold_mix", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % MESSAGES.len();
            sampler.should_sample(black_box(MESSAGES[i]), Severity::Info)
        });
    });

    c.bench_function("should_sample_cached", |b| {
        sampler.should_sample(MESSAGES[0], Severity::Info);
        b.iter(|| sampler.should_sample(black_box(MESSAGES[0]), Severity::Info));
    });
}

criterion_group!(
    benches,
    bench_normalization,
    bench_signature,
    bench_should_sample
);
criterion_main!(benches);
