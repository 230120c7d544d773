//! Recommendation provider seam.
//!
//! "What rates should we sample at" is delegated through one capability
//! interface. LLM-backed implementations live with the host; the engine
//! ships `RuleBasedProvider` so policy generation works with no external
//! dependency at all. Provider failures propagate to the caller — they are
//! never silently replaced with a guess, because the generator's invariant
//! pass is the only thing allowed to rewrite rates.

use crate::core::{Result, Severity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw rate recommendation returned by a provider, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub global_rate: f64,
    pub severity_rates: HashMap<Severity, f64>,
    pub pattern_rates: HashMap<String, f64>,
    pub anomaly_boost: f64,
    pub reasoning: String,
    pub model: String,
}

/// Capability interface for rate recommendation.
///
/// Implementations are chosen by construction, not inheritance; the engine
/// treats them all as an opaque prompt-to-rates function.
#[async_trait]
pub trait RecommendationProvider: Send + Sync {
    /// Produce a recommendation for the given analysis prompt.
    async fn generate(&self, prompt: &str) -> Result<Recommendation>;

    /// Identifier of the underlying model, for logging and policy metadata.
    fn model_name(&self) -> &str;
}

/// Conservative rule-based provider requiring no external service.
///
/// Default rates: DEBUG 0.05, INFO 0.2, WARNING 0.5, ERROR/CRITICAL 1.0,
/// anomaly_boost 3.0.
#[derive(Debug, Default)]
pub struct RuleBasedProvider;

impl RuleBasedProvider {
    pub fn new() -> Self {
        RuleBasedProvider
    }
}

#[async_trait]
impl RecommendationProvider for RuleBasedProvider {
    async fn generate(&self, _prompt: &str) -> Result<Recommendation> {
        tracing::info!("generating rule-based recommendation");

        let severity_rates = HashMap::from([
            (Severity::Debug, 0.05),
            (Severity::Info, 0.2),
            (Severity::Warning, 0.5),
            (Severity::Error, 1.0),
            (Severity::Critical, 1.0),
        ]);

        Ok(Recommendation {
            global_rate: 1.0,
            severity_rates,
            pattern_rates: HashMap::new(),
            anomaly_boost: 3.0,
            reasoning: "Conservative rule-based policy - recommendation model unavailable or disabled"
                .to_owned(),
            model: "rule-based".to_owned(),
        })
    }

    fn model_name(&self) -> &str {
        "rule-based"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rule_based_rates() {
        let provider = RuleBasedProvider::new();
        let rec = provider.generate("ignored").await.unwrap();

        assert_eq!(rec.severity_rates[&Severity::Error], 1.0);
        assert_eq!(rec.severity_rates[&Severity::Critical], 1.0);
        assert_eq!(rec.severity_rates[&Severity::Debug], 0.05);
        assert_eq!(rec.anomaly_boost, 3.0);
        assert_eq!(provider.model_name(), "rule-based");
    }
}
