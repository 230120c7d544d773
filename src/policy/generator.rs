//! Policy generation from analysis reports.
//!
//! The generator builds a prompt out of the analysis summary, delegates the
//! rate choice to a `RecommendationProvider`, then re-asserts the safety
//! invariants on whatever comes back. The invariant pass is unconditional:
//! no provider is trusted to keep ERROR/CRITICAL at 100%.

use crate::analysis::AnalysisResult;
use crate::core::Result;
use crate::policy::provider::RecommendationProvider;
use crate::policy::SamplingPolicy;
use chrono::Utc;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Turns analysis results into validated sampling policies.
pub struct PolicyGenerator {
    provider: Arc<dyn RecommendationProvider>,
    next_version: AtomicU64,
}

impl PolicyGenerator {
    pub fn new(provider: Arc<dyn RecommendationProvider>) -> Self {
        PolicyGenerator {
            provider,
            next_version: AtomicU64::new(1),
        }
    }

    /// Generate a policy for a service from its analysis result.
    ///
    /// Provider failures propagate; callers wanting a guaranteed-safe
    /// fallback construct the generator with `RuleBasedProvider`.
    pub async fn generate_policy(
        &self,
        service_name: &str,
        analysis: &AnalysisResult,
        cost_target: Option<f64>,
    ) -> Result<SamplingPolicy> {
        let prompt = build_prompt(service_name, analysis, cost_target);

        tracing::info!(
            service = service_name,
            patterns = analysis.summary.unique_patterns,
            anomalies = analysis.summary.anomalies_detected,
            model = self.provider.model_name(),
            "generating policy"
        );

        let recommendation = self.provider.generate(&prompt).await.map_err(|e| {
            tracing::error!(service = service_name, error = %e, "policy generation failed");
            e
        })?;

        let mut policy = SamplingPolicy {
            version: self.next_version.fetch_add(1, Ordering::Relaxed),
            global_rate: recommendation.global_rate,
            severity_rates: recommendation.severity_rates,
            pattern_rates: recommendation.pattern_rates,
            anomaly_boost: recommendation.anomaly_boost,
            reasoning: Some(recommendation.reasoning),
            created_at: Some(Utc::now()),
        };
        // Mandatory regardless of provider trust.
        policy.enforce_invariants();

        tracing::info!(
            service = service_name,
            version = policy.version,
            global_rate = policy.global_rate,
            model = recommendation.model.as_str(),
            "policy generated"
        );

        Ok(policy)
    }
}

/// Render the analysis into the provider prompt.
fn build_prompt(service_name: &str, analysis: &AnalysisResult, cost_target: Option<f64>) -> String {
    let summary = &analysis.summary;
    let mut prompt = String::with_capacity(1024);

    let _ = writeln!(prompt, "Analyze these log patterns and generate an intelligent sampling policy.");
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Service: {}", service_name);
    let _ = writeln!(prompt, "Total Logs Analyzed: {}", summary.total_logs);
    let _ = writeln!(prompt, "Unique Patterns: {}", summary.unique_patterns);
    let _ = writeln!(prompt, "Clusters Found: {}", summary.clusters_found);
    let _ = writeln!(prompt, "Anomalies Detected: {}", summary.anomalies_detected);
    let _ = writeln!(prompt, "Error Rate: {:.1}%", summary.error_rate * 100.0);

    match cost_target {
        Some(target) => {
            let _ = writeln!(prompt, "Cost Target: ${}/day", target);
            let _ = writeln!(prompt, "Current volume: {} logs/hour", summary.total_logs);
        },
        None => {
            let _ = writeln!(prompt, "Cost Target: No specific target, optimize for value");
        },
    }

    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Severity Distribution:");
    if summary.severity_distribution.is_empty() {
        let _ = writeln!(prompt, "  No data");
    } else {
        let mut severities: Vec<_> = summary.severity_distribution.iter().collect();
        severities.sort_by_key(|(severity, _)| **severity);
        for (severity, count) in severities {
            let _ = writeln!(prompt, "  {}: {} logs", severity, count);
        }
    }

    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Top Patterns (by frequency):");
    if summary.top_patterns.is_empty() {
        let _ = writeln!(prompt, "None");
    } else {
        for (i, pattern) in summary.top_patterns.iter().enumerate() {
            let preview: String = pattern.message.chars().take(80).collect();
            let _ = writeln!(
                prompt,
                "- Pattern {}: '{}' (count: {}, signature: {}...)",
                i + 1,
                preview,
                pattern.count,
                &pattern.signature.as_str()[..8],
            );
        }
    }

    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Anomalies Detected:");
    if analysis.anomalies.is_empty() {
        let _ = writeln!(prompt, "None detected");
    } else {
        for anomaly in analysis.anomalies.iter().take(5) {
            let _ = writeln!(
                prompt,
                "- [{:?}] {:?}: {}",
                anomaly.severity, anomaly.kind, anomaly.message
            );
        }
    }

    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "REMEMBER: ERROR and CRITICAL must ALWAYS be 1.0 (100% sampling)");

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::LogAnalyzer;
    use crate::core::{LogRecord, LogsiftError, Result, Severity};
    use crate::policy::provider::{Recommendation, RuleBasedProvider};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};

    fn analysis_of(logs: &[LogRecord]) -> AnalysisResult {
        LogAnalyzer::default().analyze(logs, &HashSet::new())
    }

    /// Provider returning deliberately unsafe rates.
    struct RecklessProvider;

    #[async_trait]
    impl RecommendationProvider for RecklessProvider {
        async fn generate(&self, _prompt: &str) -> Result<Recommendation> {
            Ok(Recommendation {
                global_rate: 2.5,
                severity_rates: HashMap::from([
                    (Severity::Error, 0.1),
                    (Severity::Critical, 0.0),
                    (Severity::Info, -1.0),
                ]),
                pattern_rates: HashMap::from([("deadbeef".to_owned(), 7.0)]),
                anomaly_boost: 0.0,
                reasoning: "aggressively wrong".to_owned(),
                model: "reckless".to_owned(),
            })
        }

        fn model_name(&self) -> &str {
            "reckless"
        }
    }

    /// Provider that always fails.
    struct BrokenProvider;

    #[async_trait]
    impl RecommendationProvider for BrokenProvider {
        async fn generate(&self, _prompt: &str) -> Result<Recommendation> {
            Err(LogsiftError::provider("model endpoint unreachable"))
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_invariants_enforced_on_unsafe_provider() {
        let generator = PolicyGenerator::new(Arc::new(RecklessProvider));
        let logs = vec![LogRecord::new("boom", Severity::Error, "test")];
        let policy = generator
            .generate_policy("svc", &analysis_of(&logs), None)
            .await
            .unwrap();

        assert_eq!(policy.severity_rate(Severity::Error), 1.0);
        assert_eq!(policy.severity_rate(Severity::Critical), 1.0);
        assert_eq!(policy.global_rate, 1.0);
        assert_eq!(policy.severity_rate(Severity::Info), 0.0);
        assert_eq!(policy.pattern_rate("deadbeef"), Some(1.0));
        assert!(policy.anomaly_boost >= 1.0);
        assert!(policy.is_valid());
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let generator = PolicyGenerator::new(Arc::new(BrokenProvider));
        let result = generator
            .generate_policy("svc", &analysis_of(&[]), None)
            .await;
        assert!(matches!(result, Err(LogsiftError::Provider(_))));
    }

    #[tokio::test]
    async fn test_versions_increase_monotonically() {
        let generator = PolicyGenerator::new(Arc::new(RuleBasedProvider::new()));
        let analysis = analysis_of(&[]);

        let first = generator.generate_policy("svc", &analysis, None).await.unwrap();
        let second = generator.generate_policy("svc", &analysis, Some(25.0)).await.unwrap();
        assert!(second.version > first.version);
    }

    #[tokio::test]
    async fn test_prompt_mentions_service_and_patterns() {
        let logs: Vec<LogRecord> = (0..10)
            .map(|i| LogRecord::new(format!("user {} logged in", i), Severity::Info, "auth"))
            .collect();
        let analysis = analysis_of(&logs);

        let prompt = build_prompt("auth-api", &analysis, Some(10.0));
        assert!(prompt.contains("Service: auth-api"));
        assert!(prompt.contains("Total Logs Analyzed: 10"));
        assert!(prompt.contains("Cost Target: $10/day"));
        assert!(prompt.contains("Top Patterns"));
        assert!(prompt.contains("ERROR and CRITICAL must ALWAYS be 1.0"));
    }
}
