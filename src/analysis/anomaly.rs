//! Statistical anomaly detection over log patterns.
//!
//! Each detector is independent and returns at most one anomaly:
//! rate-ratio spikes, z-score outliers, error surges, and first-seen
//! patterns. A bounded window of recent timestamps supports live rate
//! computation.

use crate::core::{AnalysisConfig, AnomalyThresholds, Signature};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Kind of detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    RateSpike,
    NewPattern,
    ErrorSurge,
}

/// Severity of a detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
}

/// A statistically or structurally significant deviation.
///
/// Ephemeral: produced per analysis run, not persisted by the engine.
#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    /// Signature the anomaly concerns, or a detector-scoped marker such as
    /// `global_rate` / `error_rate`.
    pub pattern_signature: String,
    pub kind: AnomalyKind,
    pub severity: AnomalySeverity,
    pub current_value: f64,
    pub baseline_value: f64,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
    pub message: String,
}

/// Detects anomalies with configurable statistical thresholds.
///
/// Owns a bounded window of recent event timestamps, sized by
/// `rate_window_size`, so callers can feed it live events and ask for the
/// observed rate to compare against a baseline.
pub struct AnomalyDetector {
    thresholds: AnomalyThresholds,
    window: Mutex<RateWindow>,
}

impl AnomalyDetector {
    pub fn new(config: &AnalysisConfig) -> Self {
        AnomalyDetector {
            thresholds: config.thresholds.clone(),
            window: Mutex::new(RateWindow::new(config.rate_window_size)),
        }
    }

    /// Record a live event timestamp (seconds since epoch) in the window.
    pub fn record_event(&self, timestamp: f64) {
        self.window.lock().record(timestamp);
    }

    /// Observed events per second over the trailing window ending at `now`.
    pub fn observed_rate(&self, now: f64, window_seconds: f64) -> f64 {
        self.window.lock().current_rate(now, window_seconds)
    }

    /// Flag the current rate when it is a multiple of the baseline.
    ///
    /// A zero baseline never fires here; `detect_error_surge` covers the
    /// zero-to-nonzero transition for errors, where it matters.
    pub fn detect_rate_anomaly(&self, current_rate: f64, baseline_rate: f64) -> Option<Anomaly> {
        if baseline_rate == 0.0 {
            return None;
        }

        let ratio = current_rate / baseline_rate;
        let t = &self.thresholds;

        let (severity, confidence) = if ratio >= t.rate_high {
            (AnomalySeverity::High, (ratio / 10.0).min(1.0))
        } else if ratio >= t.rate_medium {
            (AnomalySeverity::Medium, 0.7)
        } else if ratio >= t.rate_low {
            (AnomalySeverity::Low, 0.5)
        } else {
            return None;
        };

        Some(Anomaly {
            pattern_signature: "global_rate".to_owned(),
            kind: AnomalyKind::RateSpike,
            severity,
            current_value: current_rate,
            baseline_value: baseline_rate,
            confidence,
            detected_at: Utc::now(),
            message: format!("Log rate spike detected: {:.1}x normal rate", ratio),
        })
    }

    /// Flag a value whose z-score against a historical series exceeds the
    /// threshold. Needs at least two samples and nonzero variance.
    pub fn detect_with_zscore(&self, values: &[f64], current_value: f64) -> Option<Anomaly> {
        if values.len() < 2 {
            return None;
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        let std_dev = variance.sqrt();

        if std_dev == 0.0 {
            return None;
        }

        let z_score = ((current_value - mean) / std_dev).abs();
        if z_score <= self.thresholds.z_score {
            return None;
        }

        let severity = if z_score > self.thresholds.z_high {
            AnomalySeverity::High
        } else if z_score > self.thresholds.z_medium {
            AnomalySeverity::Medium
        } else {
            AnomalySeverity::Low
        };

        Some(Anomaly {
            pattern_signature: "zscore_analysis".to_owned(),
            kind: AnomalyKind::RateSpike,
            severity,
            current_value,
            baseline_value: mean,
            confidence: (z_score / 10.0).min(1.0),
            detected_at: Utc::now(),
            message: format!(
                "Z-score anomaly: {:.2} (threshold: {})",
                z_score, self.thresholds.z_score
            ),
        })
    }

    /// Flag a surge in error-level log rate. More sensitive than the general
    /// rate detector: errors going from zero to nonzero is itself high.
    pub fn detect_error_surge(
        &self,
        current_error_rate: f64,
        baseline_error_rate: f64,
    ) -> Option<Anomaly> {
        if baseline_error_rate == 0.0 && current_error_rate > 0.0 {
            return Some(Anomaly {
                pattern_signature: "error_rate".to_owned(),
                kind: AnomalyKind::ErrorSurge,
                severity: AnomalySeverity::High,
                current_value: current_error_rate,
                baseline_value: 0.0,
                confidence: 0.9,
                detected_at: Utc::now(),
                message: "New errors detected (previously zero error rate)".to_owned(),
            });
        }

        if baseline_error_rate == 0.0 {
            return None;
        }

        let ratio = current_error_rate / baseline_error_rate;
        if ratio < self.thresholds.error_surge {
            return None;
        }

        let severity = if ratio >= self.thresholds.error_surge_high {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        };

        Some(Anomaly {
            pattern_signature: "error_rate".to_owned(),
            kind: AnomalyKind::ErrorSurge,
            severity,
            current_value: current_error_rate,
            baseline_value: baseline_error_rate,
            confidence: (ratio / 5.0).min(1.0),
            detected_at: Utc::now(),
            message: format!("Error surge detected: {:.1}x normal error rate", ratio),
        })
    }

    /// A signature absent from the known set is new. First occurrences are
    /// always surfaced.
    pub fn is_new_pattern(&self, signature: &Signature, known: &HashSet<Signature>) -> bool {
        !known.contains(signature)
    }
}

/// Fixed-capacity ring of recent event timestamps (seconds since epoch)
/// supporting live rate computation over a trailing window.
#[derive(Debug)]
pub struct RateWindow {
    timestamps: VecDeque<f64>,
    capacity: usize,
}

impl RateWindow {
    pub fn new(capacity: usize) -> Self {
        RateWindow {
            timestamps: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record an event timestamp, dropping the oldest at capacity.
    pub fn record(&mut self, timestamp: f64) {
        if self.timestamps.len() >= self.capacity {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(timestamp);
    }

    /// Events per second over the trailing `window_seconds` ending at `now`.
    /// Fewer than two retained events means no meaningful rate: 0.0.
    pub fn current_rate(&self, now: f64, window_seconds: f64) -> f64 {
        if self.timestamps.len() < 2 || window_seconds <= 0.0 {
            return 0.0;
        }

        let recent = self
            .timestamps
            .iter()
            .filter(|&&t| now - t < window_seconds)
            .count();
        if recent < 2 {
            return 0.0;
        }

        recent as f64 / window_seconds
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::compute_signature;

    fn detector() -> AnomalyDetector {
        AnomalyDetector::new(&AnalysisConfig::default())
    }

    #[test]
    fn test_rate_anomaly_thresholds() {
        let d = detector();

        assert!(d.detect_rate_anomaly(15.0, 10.0).is_none()); // 1.5x
        let low = d.detect_rate_anomaly(25.0, 10.0).unwrap(); // 2.5x
        assert_eq!(low.severity, AnomalySeverity::Low);
        assert_eq!(low.confidence, 0.5);

        let medium = d.detect_rate_anomaly(40.0, 10.0).unwrap(); // 4x
        assert_eq!(medium.severity, AnomalySeverity::Medium);
        assert_eq!(medium.confidence, 0.7);

        let high = d.detect_rate_anomaly(60.0, 10.0).unwrap(); // 6x
        assert_eq!(high.severity, AnomalySeverity::High);
        assert!((high.confidence - 0.6).abs() < 1e-9);

        let extreme = d.detect_rate_anomaly(200.0, 10.0).unwrap(); // 20x
        assert_eq!(extreme.confidence, 1.0);
    }

    #[test]
    fn test_rate_anomaly_zero_baseline() {
        assert!(detector().detect_rate_anomaly(100.0, 0.0).is_none());
    }

    #[test]
    fn test_zscore_detection() {
        let d = detector();
        let history: Vec<f64> = vec![10.0, 11.0, 9.0, 10.5, 9.5, 10.0, 10.2, 9.8];

        assert!(d.detect_with_zscore(&history, 10.3).is_none());
        let anomaly = d.detect_with_zscore(&history, 50.0).unwrap();
        assert_eq!(anomaly.severity, AnomalySeverity::High);
        assert_eq!(anomaly.kind, AnomalyKind::RateSpike);
    }

    #[test]
    fn test_zscore_needs_variance_and_samples() {
        let d = detector();
        assert!(d.detect_with_zscore(&[10.0], 100.0).is_none());
        assert!(d.detect_with_zscore(&[10.0, 10.0, 10.0], 100.0).is_none());
    }

    #[test]
    fn test_error_surge_thresholds() {
        let d = detector();

        assert!(d.detect_error_surge(1.5, 1.0).is_none());
        let medium = d.detect_error_surge(3.0, 1.0).unwrap();
        assert_eq!(medium.severity, AnomalySeverity::Medium);
        let high = d.detect_error_surge(5.0, 1.0).unwrap();
        assert_eq!(high.severity, AnomalySeverity::High);
    }

    #[test]
    fn test_error_surge_from_zero_baseline() {
        let d = detector();
        let anomaly = d.detect_error_surge(0.5, 0.0).unwrap();
        assert_eq!(anomaly.severity, AnomalySeverity::High);
        assert_eq!(anomaly.confidence, 0.9);

        assert!(d.detect_error_surge(0.0, 0.0).is_none());
    }

    #[test]
    fn test_new_pattern_detection() {
        let d = detector();
        let known: HashSet<Signature> =
            [compute_signature("User 1 logged in")].into_iter().collect();

        assert!(!d.is_new_pattern(&compute_signature("User 99 logged in"), &known));
        assert!(d.is_new_pattern(&compute_signature("disk on fire"), &known));
    }

    #[test]
    fn test_configured_window_size_bounds_detector() {
        let mut config = AnalysisConfig::default();
        config.rate_window_size = 5;
        let d = AnomalyDetector::new(&config);

        let now = 100.0;
        for i in 0..20 {
            d.record_event(now - i as f64 * 0.1);
        }
        // Only five timestamps survive the bound: 5 events / 10s window.
        assert_eq!(d.observed_rate(now, 10.0), 0.5);
    }

    #[test]
    fn test_zscore_severity_steps_configurable() {
        let history = vec![0.0, 2.0]; // mean 1, stddev 1; current 9 -> z = 8
        let defaults = detector();
        assert_eq!(
            defaults.detect_with_zscore(&history, 9.0).unwrap().severity,
            AnomalySeverity::High
        );

        let mut config = AnalysisConfig::default();
        config.thresholds.z_medium = 9.0;
        config.thresholds.z_high = 9.5;
        let raised = AnomalyDetector::new(&config);
        assert_eq!(
            raised.detect_with_zscore(&history, 9.0).unwrap().severity,
            AnomalySeverity::Low
        );
    }

    #[test]
    fn test_rate_window_bounded() {
        let mut window = RateWindow::new(5);
        for i in 0..20 {
            window.record(i as f64);
        }
        assert_eq!(window.len(), 5);
    }

    #[test]
    fn test_rate_window_trailing_rate() {
        let mut window = RateWindow::new(100);
        let now = 1_000.0;
        for i in 0..30 {
            window.record(now - i as f64 * 0.2); // 5 events/sec for 6s
        }
        let rate = window.current_rate(now, 10.0);
        assert!(rate > 2.0 && rate <= 5.0, "rate was {}", rate);

        // Everything outside the window.
        assert_eq!(window.current_rate(now + 100.0, 10.0), 0.0);
    }

    #[test]
    fn test_rate_window_too_few_samples() {
        let mut window = RateWindow::new(10);
        window.record(1.0);
        assert_eq!(window.current_rate(2.0, 10.0), 0.0);
    }
}
