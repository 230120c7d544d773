//! Runtime sampling decision engine.
//!
//! The sampler is an explicitly constructed instance owned by the host:
//! `start()` spawns its background loops, `stop()` joins them. The decision
//! path is synchronous and never performs network I/O — policy fetches and
//! pattern reports happen only on the background loops. Shared state is one
//! `ArcSwap` policy slot (single pointer swap, so in-flight decisions never
//! see a half-updated policy) and one DashMap of pattern statistics
//! (per-entry update, no lock across I/O).

use crate::cache::{CacheStats, SignatureCache};
use crate::core::{Result, SamplerConfig, Severity, Signature};
use crate::policy::SamplingPolicy;
use crate::signature::compute_signature;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Read access to the active policy for a service.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Fetch the currently active policy, if any exists.
    async fn get_active_policy(&self, service: &str) -> Result<Option<SamplingPolicy>>;
}

/// Destination for locally accumulated pattern statistics.
#[async_trait]
pub trait PatternSink: Send + Sync {
    /// Deliver a batch of pattern stats. An `Ok` return confirms receipt;
    /// the sampler clears the reported entries only then.
    async fn report_patterns(&self, service: &str, patterns: Vec<PatternStats>) -> Result<()>;
}

/// Locally accumulated statistics for one pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternStats {
    pub signature: Signature,
    /// Truncated sample of the first message seen for this pattern.
    pub message_sample: String,
    pub count: u64,
    pub severity_distribution: std::collections::HashMap<Severity, u64>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Snapshot of sampler runtime counters.
#[derive(Debug, Clone)]
pub struct SamplerStats {
    /// Version of the active policy, if one is loaded.
    pub policy_version: Option<u64>,
    /// Distinct patterns currently tracked.
    pub patterns_tracked: usize,
    /// Events observed since start (tracked or not).
    pub events_seen: u64,
    /// Signature cache counters.
    pub cache: CacheStats,
}

/// Stateful adaptive sampler applying the active policy to live events.
pub struct AdaptiveSampler {
    service: String,
    config: SamplerConfig,
    store: Arc<dyn PolicyStore>,
    sink: Arc<dyn PatternSink>,
    policy: ArcSwapOption<SamplingPolicy>,
    pattern_stats: DashMap<Signature, PatternStats>,
    signature_cache: SignatureCache,
    events_seen: AtomicU64,
    running: AtomicBool,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AdaptiveSampler {
    /// Create a stopped sampler for a service.
    pub fn new(
        service: impl Into<String>,
        config: SamplerConfig,
        cache_config: &crate::core::CacheConfig,
        store: Arc<dyn PolicyStore>,
        sink: Arc<dyn PatternSink>,
    ) -> Self {
        AdaptiveSampler {
            service: service.into(),
            config,
            store,
            sink,
            policy: ArcSwapOption::empty(),
            pattern_stats: DashMap::new(),
            signature_cache: SignatureCache::new(cache_config),
            events_seen: AtomicU64::new(0),
            running: AtomicBool::new(false),
            shutdown: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start the background loops. Idempotent: a second call is a no-op.
    ///
    /// The initial policy fetch is best-effort — an unreachable store leaves
    /// the sampler keeping everything until the refresh loop succeeds.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        self.refresh_policy().await;

        let (tx, rx) = watch::channel(false);
        *self.shutdown.lock().await = Some(tx);

        let mut tasks = self.tasks.lock().await;
        tasks.push(tokio::spawn(Self::policy_refresh_loop(
            Arc::clone(self),
            rx.clone(),
        )));
        tasks.push(tokio::spawn(Self::pattern_report_loop(Arc::clone(self), rx)));

        tracing::info!(service = self.service.as_str(), "sampler started");
    }

    /// Stop the loops and attempt one final report, bounded by
    /// `shutdown_report_timeout` so shutdown cannot hang on an unreachable
    /// backend. A failed final report leaves stats intact.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(tx) = self.shutdown.lock().await.take() {
            let _ = tx.send(true);
        }

        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "sampler task did not join cleanly");
            }
        }

        let final_report = self.report_patterns();
        if tokio::time::timeout(self.config.shutdown_report_timeout, final_report)
            .await
            .is_err()
        {
            tracing::warn!(
                service = self.service.as_str(),
                "final pattern report timed out; stats retained"
            );
        }

        tracing::info!(service = self.service.as_str(), "sampler stopped");
    }

    /// Decide whether to keep a log event. Hot path: synchronous, O(1),
    /// no I/O, callable concurrently from any number of call sites.
    pub fn should_sample(&self, message: &str, severity: Severity) -> (bool, Signature) {
        let signature = self.signature_cache.get_or_compute(message, compute_signature);

        // Stats always accrue, kept or dropped.
        self.track_pattern(&signature, message, severity);

        // Hard invariant, independent of any policy.
        if severity.is_always_kept() {
            return (true, signature);
        }

        let Some(policy) = self.policy.load_full() else {
            // Fail open: availability beats sampling precision.
            return (true, signature);
        };

        let rate = match policy.pattern_rate(signature.as_str()) {
            Some(pattern_rate) => pattern_rate,
            None => policy.severity_rate(severity),
        };

        let keep = fastrand::f64() < rate;
        tracing::trace!(signature = signature.as_str(), rate, keep, "sampling decision");
        (keep, signature)
    }

    /// Runtime counters for diagnostics.
    pub fn stats(&self) -> SamplerStats {
        SamplerStats {
            policy_version: self.policy.load().as_ref().map(|p| p.version),
            patterns_tracked: self.pattern_stats.len(),
            events_seen: self.events_seen.load(Ordering::Relaxed),
            cache: self.signature_cache.stats(),
        }
    }

    /// Version of the active policy, if loaded.
    pub fn policy_version(&self) -> Option<u64> {
        self.policy.load().as_ref().map(|p| p.version)
    }

    fn track_pattern(&self, signature: &Signature, message: &str, severity: Severity) {
        self.events_seen.fetch_add(1, Ordering::Relaxed);

        let now = Utc::now();
        match self.pattern_stats.get_mut(signature) {
            Some(mut entry) => {
                entry.count += 1;
                entry.last_seen = now;
                *entry.severity_distribution.entry(severity).or_insert(0) += 1;
            },
            None => {
                // Bound the table: beyond the cap new signatures are observed
                // but not tracked, so a signature explosion cannot grow memory.
                if self.pattern_stats.len() >= self.config.max_pattern_cache_size {
                    return;
                }
                let sample: String = message.chars().take(self.config.message_sample_len).collect();
                let mut severity_distribution = std::collections::HashMap::new();
                severity_distribution.insert(severity, 1);
                self.pattern_stats.insert(
                    signature.clone(),
                    PatternStats {
                        signature: signature.clone(),
                        message_sample: sample,
                        count: 1,
                        severity_distribution,
                        first_seen: now,
                        last_seen: now,
                    },
                );
            },
        }
    }

    /// Fetch the latest policy and swap it in. Failures are logged and the
    /// previous policy stays active.
    async fn refresh_policy(&self) {
        match self.store.get_active_policy(&self.service).await {
            Ok(Some(policy)) => {
                let old_version = self.policy_version().unwrap_or(0);
                let version = policy.version;
                let global_rate = policy.global_rate;
                self.policy.store(Some(Arc::new(policy)));
                tracing::info!(
                    service = self.service.as_str(),
                    version,
                    old_version,
                    global_rate,
                    "policy updated"
                );
            },
            Ok(None) => {
                tracing::debug!(
                    service = self.service.as_str(),
                    "no active policy; keeping everything"
                );
            },
            Err(e) => {
                tracing::error!(
                    service = self.service.as_str(),
                    error = %e,
                    "policy refresh failed"
                );
            },
        }
    }

    /// Report accumulated stats. Only the signatures actually reported are
    /// cleared, and only on confirmed success (at-least-once; duplicates
    /// are tolerated downstream).
    async fn report_patterns(&self) {
        if self.pattern_stats.is_empty() {
            return;
        }

        let batch: Vec<PatternStats> = self
            .pattern_stats
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let reported: Vec<Signature> = batch.iter().map(|p| p.signature.clone()).collect();
        let count = batch.len();

        match self.sink.report_patterns(&self.service, batch).await {
            Ok(()) => {
                for signature in reported {
                    self.pattern_stats.remove(&signature);
                }
                tracing::info!(service = self.service.as_str(), count, "patterns reported");
            },
            Err(e) => {
                tracing::error!(
                    service = self.service.as_str(),
                    error = %e,
                    "pattern report failed; stats retained for retry"
                );
            },
        }
    }

    async fn policy_refresh_loop(sampler: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(sampler.config.policy_refresh_interval);
        ticker.tick().await; // immediate first tick
        loop {
            tokio::select! {
                _ = ticker.tick() => sampler.refresh_policy().await,
                _ = shutdown.changed() => break,
            }
        }
    }

    async fn pattern_report_loop(sampler: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(sampler.config.pattern_report_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => sampler.report_patterns().await,
                _ = shutdown.changed() => break,
            }
        }
    }
}
