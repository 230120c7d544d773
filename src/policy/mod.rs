//! Sampling policies and the safety invariants they must satisfy.
//!
//! A policy is immutable once issued: the sampler replaces it whole via an
//! atomic swap and versions increase monotonically. Whatever produced the
//! policy, `enforce_invariants` is applied before it is handed out —
//! under-sampling an error is categorically worse than ignoring a
//! misconfigured recommendation, so violations are corrected silently.

pub mod generator;
pub mod provider;

pub use generator::PolicyGenerator;
pub use provider::{Recommendation, RecommendationProvider, RuleBasedProvider};

use crate::core::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Versioned schedule of keep-probabilities by severity and by pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingPolicy {
    /// Monotonically increasing version.
    pub version: u64,
    /// Keep probability when no severity or pattern rate applies.
    pub global_rate: f64,
    /// Keep probability per severity.
    pub severity_rates: HashMap<Severity, f64>,
    /// Keep probability per pattern signature, overriding severity rates.
    pub pattern_rates: HashMap<String, f64>,
    /// Sampling multiplier applied while anomalies are active. Always >= 1.
    pub anomaly_boost: f64,
    /// Provider's explanation for the chosen rates.
    pub reasoning: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl SamplingPolicy {
    /// A policy that keeps everything. Used when nothing better is known.
    pub fn keep_all(version: u64) -> Self {
        SamplingPolicy {
            version,
            global_rate: 1.0,
            severity_rates: HashMap::new(),
            pattern_rates: HashMap::new(),
            anomaly_boost: 1.0,
            reasoning: None,
            created_at: Some(Utc::now()),
        }
    }

    /// Keep probability for a severity, falling back to the global rate.
    pub fn severity_rate(&self, severity: Severity) -> f64 {
        self.severity_rates
            .get(&severity)
            .copied()
            .unwrap_or(self.global_rate)
    }

    /// Keep probability for a specific pattern, if one is set.
    pub fn pattern_rate(&self, signature: &str) -> Option<f64> {
        self.pattern_rates.get(signature).copied()
    }

    /// Force the safety invariants to hold, correcting violations in place:
    /// ERROR and CRITICAL pinned to 1.0, every rate clamped to [0, 1],
    /// anomaly_boost clamped to >= 1.0.
    pub fn enforce_invariants(&mut self) {
        self.global_rate = self.global_rate.clamp(0.0, 1.0);

        for rate in self.severity_rates.values_mut() {
            *rate = rate.clamp(0.0, 1.0);
        }
        self.severity_rates.insert(Severity::Error, 1.0);
        self.severity_rates.insert(Severity::Critical, 1.0);

        for rate in self.pattern_rates.values_mut() {
            *rate = rate.clamp(0.0, 1.0);
        }

        if self.anomaly_boost < 1.0 {
            self.anomaly_boost = 1.0;
        }
    }

    /// True when every invariant already holds.
    pub fn is_valid(&self) -> bool {
        let pinned = self.severity_rates.get(&Severity::Error) == Some(&1.0)
            && self.severity_rates.get(&Severity::Critical) == Some(&1.0);
        let rates_ok = (0.0..=1.0).contains(&self.global_rate)
            && self.severity_rates.values().all(|r| (0.0..=1.0).contains(r))
            && self.pattern_rates.values().all(|r| (0.0..=1.0).contains(r));
        pinned && rates_ok && self.anomaly_boost >= 1.0
    }
}
