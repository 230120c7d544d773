//! Configuration management for logsift.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Programmatic builder
//! - Validation and defaults
//!
//! The anomaly thresholds the detectors use are deliberately part of the
//! configuration surface so deployments can tune them without rebuilding.

use crate::core::{LogsiftError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration for logsift
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Batch analysis configuration
    pub analysis: AnalysisConfig,
    /// Runtime sampler configuration
    pub sampler: SamplerConfig,
    /// Signature cache configuration
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Pattern clustering and anomaly detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// DBSCAN cosine-distance threshold for merging patterns
    pub cluster_eps: f64,
    /// Minimum signatures for a dense cluster
    pub cluster_min_samples: usize,
    /// TF-IDF vocabulary cap
    pub max_features: usize,
    /// Anomaly detection thresholds
    pub thresholds: AnomalyThresholds,
    /// Capacity of the live rate window (recent event timestamps)
    pub rate_window_size: usize,
}

/// Statistical thresholds for the anomaly detectors.
///
/// Defaults match the ratios the detectors were tuned with: rate spikes at
/// 2x/3x/5x baseline, z-score steps at 3/4/5, error surges at 2x/4x, and
/// batch error-rate alarms at 10%/20%.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyThresholds {
    /// Rate ratio for a low-severity spike
    pub rate_low: f64,
    /// Rate ratio for a medium-severity spike
    pub rate_medium: f64,
    /// Rate ratio for a high-severity spike
    pub rate_high: f64,
    /// Z-score above which a value is anomalous
    pub z_score: f64,
    /// Z-score above which the anomaly is medium severity
    pub z_medium: f64,
    /// Z-score above which the anomaly is high severity
    pub z_high: f64,
    /// Error-rate ratio that counts as a surge
    pub error_surge: f64,
    /// Error-rate ratio that counts as a high-severity surge
    pub error_surge_high: f64,
    /// Batch error fraction that triggers an error-surge anomaly
    pub batch_error_rate: f64,
    /// Batch error fraction considered high severity
    pub batch_error_rate_high: f64,
}

/// Adaptive sampler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Interval between policy refreshes
    #[serde(with = "humantime_serde")]
    pub policy_refresh_interval: Duration,
    /// Interval between pattern-stats reports
    #[serde(with = "humantime_serde")]
    pub pattern_report_interval: Duration,
    /// Maximum distinct signatures tracked in the pattern-stats table
    pub max_pattern_cache_size: usize,
    /// Upper bound on the final report attempted during shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_report_timeout: Duration,
    /// Truncation length for stored message samples
    pub message_sample_len: usize,
}

/// Signature cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached signature entries
    pub max_entries: usize,
    /// Approximate byte budget for cached keys
    pub max_bytes: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter
    pub level: LogLevel,
    /// Structured (JSON-ish) log output
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            cluster_eps: 0.5,
            cluster_min_samples: 2,
            max_features: 100,
            thresholds: AnomalyThresholds::default(),
            rate_window_size: 1000,
        }
    }
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        AnomalyThresholds {
            rate_low: 2.0,
            rate_medium: 3.0,
            rate_high: 5.0,
            z_score: 3.0,
            z_medium: 4.0,
            z_high: 5.0,
            error_surge: 2.0,
            error_surge_high: 4.0,
            batch_error_rate: 0.1,
            batch_error_rate_high: 0.2,
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            policy_refresh_interval: Duration::from_secs(300),
            pattern_report_interval: Duration::from_secs(600),
            max_pattern_cache_size: 10_000,
            shutdown_report_timeout: Duration::from_secs(5),
            message_sample_len: 200,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_entries: 4096,
            max_bytes: 1024 * 1024, // 1MB of raw keys
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.analysis.cluster_eps <= 0.0 || self.analysis.cluster_eps > 1.0 {
            return Err(LogsiftError::config(format!(
                "cluster_eps must be in (0, 1], got {}",
                self.analysis.cluster_eps
            )));
        }

        if self.analysis.cluster_min_samples == 0 {
            return Err(LogsiftError::config("cluster_min_samples must be greater than 0"));
        }

        if self.analysis.max_features == 0 {
            return Err(LogsiftError::config("max_features must be greater than 0"));
        }

        let t = &self.analysis.thresholds;
        if !(t.rate_low <= t.rate_medium && t.rate_medium <= t.rate_high) {
            return Err(LogsiftError::config(format!(
                "rate thresholds must be ordered: {} <= {} <= {}",
                t.rate_low, t.rate_medium, t.rate_high
            )));
        }

        if !(t.z_score <= t.z_medium && t.z_medium <= t.z_high) {
            return Err(LogsiftError::config(format!(
                "z-score thresholds must be ordered: {} <= {} <= {}",
                t.z_score, t.z_medium, t.z_high
            )));
        }

        if !(0.0..=1.0).contains(&t.batch_error_rate) {
            return Err(LogsiftError::InvalidSamplingRate(t.batch_error_rate));
        }

        if self.sampler.max_pattern_cache_size == 0 {
            return Err(LogsiftError::config("max_pattern_cache_size must be greater than 0"));
        }

        if self.sampler.policy_refresh_interval.is_zero()
            || self.sampler.pattern_report_interval.is_zero()
        {
            return Err(LogsiftError::config("sampler intervals must be non-zero"));
        }

        if self.cache.max_entries == 0 || self.cache.max_bytes == 0 {
            return Err(LogsiftError::config("cache bounds must be greater than 0"));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| LogsiftError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set the DBSCAN distance threshold
    pub fn cluster_eps(mut self, eps: f64) -> Self {
        self.config.analysis.cluster_eps = eps;
        self
    }

    /// Set the policy refresh interval
    pub fn policy_refresh_interval(mut self, interval: Duration) -> Self {
        self.config.sampler.policy_refresh_interval = interval;
        self
    }

    /// Set the pattern report interval
    pub fn pattern_report_interval(mut self, interval: Duration) -> Self {
        self.config.sampler.pattern_report_interval = interval;
        self
    }

    /// Set the pattern-stats table bound
    pub fn max_pattern_cache_size(mut self, size: usize) -> Self {
        self.config.sampler.max_pattern_cache_size = size;
        self
    }

    /// Set signature cache bounds
    pub fn cache_bounds(mut self, max_entries: usize, max_bytes: usize) -> Self {
        self.config.cache.max_entries = max_entries;
        self.config.cache.max_bytes = max_bytes;
        self
    }

    /// Override anomaly thresholds
    pub fn thresholds(mut self, thresholds: AnomalyThresholds) -> Self {
        self.config.analysis.thresholds = thresholds;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize a tracing subscriber honoring the logging config and
/// `RUST_LOG`. Intended for hosts that have no subscriber of their own.
pub fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if logging.structured {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    // A host may already have installed a subscriber.
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed, keeping existing one");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_eps() {
        let mut config = Config::default();
        config.analysis.cluster_eps = 0.0;
        assert!(config.validate().is_err());

        config.analysis.cluster_eps = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unordered_rate_thresholds() {
        let mut config = Config::default();
        config.analysis.thresholds.rate_low = 6.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unordered_zscore_thresholds() {
        let mut config = Config::default();
        config.analysis.thresholds.z_high = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .cluster_eps(0.3)
            .max_pattern_cache_size(500)
            .policy_refresh_interval(Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(config.analysis.cluster_eps, 0.3);
        assert_eq!(config.sampler.max_pattern_cache_size, 500);
        assert_eq!(config.sampler.policy_refresh_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
analysis:
  cluster_eps: 0.4
  cluster_min_samples: 3
sampler:
  policy_refresh_interval: 2m
  pattern_report_interval: 5m
  max_pattern_cache_size: 2000
cache:
  max_entries: 1024
"#;

        let config = ConfigBuilder::new().from_yaml(yaml).unwrap().build().unwrap();

        assert_eq!(config.analysis.cluster_eps, 0.4);
        assert_eq!(config.analysis.cluster_min_samples, 3);
        assert_eq!(config.sampler.policy_refresh_interval, Duration::from_secs(120));
        assert_eq!(config.sampler.max_pattern_cache_size, 2000);
        assert_eq!(config.cache.max_entries, 1024);
    }
}
