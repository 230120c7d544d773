//! Batch analysis pipeline: clustering, anomaly detection, and the
//! structured report consumed by policy generation.
//!
//! The whole path is pure computation: deterministic for identical input
//! and known-signature seed, no I/O, no internal concurrency. Hosts may
//! run independent analyses in parallel.

pub mod anomaly;
pub mod cluster;

pub use anomaly::{Anomaly, AnomalyDetector, AnomalyKind, AnomalySeverity, RateWindow};
pub use cluster::{PatternAnalysis, PatternCluster, PatternClusterer};

use crate::core::{AnalysisConfig, LogRecord, Severity, Signature};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Aggregate statistics over one analyzed batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisSummary {
    pub total_logs: usize,
    pub unique_patterns: usize,
    pub clusters_found: usize,
    pub anomalies_detected: usize,
    pub high_severity_anomalies: usize,
    /// Event counts per severity. Sums to total_logs.
    pub severity_distribution: HashMap<Severity, usize>,
    /// Fraction of the batch at ERROR or CRITICAL.
    pub error_rate: f64,
    /// Up to five clusters by descending count.
    pub top_patterns: Vec<TopPattern>,
}

/// One entry of the summary's top-pattern list.
#[derive(Debug, Clone, Serialize)]
pub struct TopPattern {
    pub message: String,
    pub count: usize,
    pub signature: Signature,
}

/// Complete result of analyzing a batch.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub pattern_analysis: PatternAnalysis,
    pub anomalies: Vec<Anomaly>,
    pub summary: AnalysisSummary,
}

/// Runs the full analysis pipeline over log batches.
pub struct LogAnalyzer {
    clusterer: PatternClusterer,
    detector: AnomalyDetector,
    config: AnalysisConfig,
}

impl LogAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        LogAnalyzer {
            clusterer: PatternClusterer::new(&config),
            detector: AnomalyDetector::new(&config),
            config,
        }
    }

    /// Analyze a batch against a set of previously seen signatures.
    ///
    /// An empty batch produces an all-zero result, never an error.
    pub fn analyze(&self, logs: &[LogRecord], known_signatures: &HashSet<Signature>) -> AnalysisResult {
        if logs.is_empty() {
            return AnalysisResult {
                pattern_analysis: PatternAnalysis {
                    clusters: Vec::new(),
                    noise_count: 0,
                    total_unique_patterns: 0,
                    total_logs: 0,
                },
                anomalies: Vec::new(),
                summary: AnalysisSummary::default(),
            };
        }

        let pattern_analysis = self.clusterer.analyze(logs);

        let mut anomalies = self.detect_new_patterns(&pattern_analysis, known_signatures);
        if let Some(surge) = self.detect_batch_error_surge(logs) {
            anomalies.push(surge);
        }

        let summary = self.summarize(&pattern_analysis, &anomalies, logs);

        AnalysisResult {
            pattern_analysis,
            anomalies,
            summary,
        }
    }

    /// Flag clusters whose representative signature was never seen before.
    fn detect_new_patterns(
        &self,
        analysis: &PatternAnalysis,
        known: &HashSet<Signature>,
    ) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        for cluster in &analysis.clusters {
            if self.detector.is_new_pattern(&cluster.signature, known) {
                let preview: String = cluster.representative_message.chars().take(100).collect();
                anomalies.push(Anomaly {
                    pattern_signature: cluster.signature.as_str().to_owned(),
                    kind: AnomalyKind::NewPattern,
                    severity: AnomalySeverity::Medium,
                    current_value: cluster.total_count as f64,
                    baseline_value: 0.0,
                    confidence: 1.0,
                    detected_at: chrono::Utc::now(),
                    message: format!("New pattern detected: {}", preview),
                });
            }
        }

        anomalies
    }

    /// Error-surge check over the batch's severity distribution.
    fn detect_batch_error_surge(&self, logs: &[LogRecord]) -> Option<Anomaly> {
        let error_count = logs
            .iter()
            .filter(|l| matches!(l.severity, Severity::Error | Severity::Critical))
            .count();
        if error_count == 0 {
            return None;
        }

        let error_rate = error_count as f64 / logs.len() as f64;
        let t = &self.config.thresholds;
        if error_rate < t.batch_error_rate {
            return None;
        }

        let severity = if error_rate >= t.batch_error_rate_high {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        };

        Some(Anomaly {
            pattern_signature: "error_rate".to_owned(),
            kind: AnomalyKind::ErrorSurge,
            severity,
            current_value: error_rate,
            baseline_value: 0.05,
            confidence: (error_rate * 5.0).min(1.0),
            detected_at: chrono::Utc::now(),
            message: format!("High error rate: {:.1}% of logs are errors", error_rate * 100.0),
        })
    }

    fn summarize(
        &self,
        analysis: &PatternAnalysis,
        anomalies: &[Anomaly],
        logs: &[LogRecord],
    ) -> AnalysisSummary {
        let mut severity_distribution: HashMap<Severity, usize> = HashMap::new();
        for log in logs {
            *severity_distribution.entry(log.severity).or_insert(0) += 1;
        }

        let error_count = severity_distribution.get(&Severity::Error).copied().unwrap_or(0)
            + severity_distribution.get(&Severity::Critical).copied().unwrap_or(0);

        let top_patterns = analysis
            .clusters
            .iter()
            .take(5)
            .map(|c| TopPattern {
                message: c.representative_message.clone(),
                count: c.total_count,
                signature: c.signature.clone(),
            })
            .collect();

        AnalysisSummary {
            total_logs: logs.len(),
            unique_patterns: analysis.total_unique_patterns,
            clusters_found: analysis.clusters.len(),
            anomalies_detected: anomalies.len(),
            high_severity_anomalies: anomalies
                .iter()
                .filter(|a| a.severity == AnomalySeverity::High)
                .count(),
            severity_distribution,
            error_rate: error_count as f64 / logs.len() as f64,
            top_patterns,
        }
    }
}

impl Default for LogAnalyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}
