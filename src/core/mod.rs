//! Core domain types, error handling, and configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    init_tracing, AnalysisConfig, AnomalyThresholds, CacheConfig, Config, ConfigBuilder,
    LogLevel, LoggingConfig, SamplerConfig,
};
pub use error::{LogsiftError, Result};
pub use types::{LogRecord, Severity, Signature};
