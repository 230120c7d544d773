//! Logsift - log pattern intelligence and adaptive sampling.
//!
//! Logsift turns raw log streams into pattern knowledge and uses that
//! knowledge to decide, per event, whether a log line is worth keeping.
//! Messages are normalized into stable signatures, batches are clustered
//! and scanned for anomalies, and the resulting analysis drives versioned
//! sampling policies that an embedded sampler applies on the hot path.
//!
//! # Features
//!
//! - **Stable Signatures**: variable data (IDs, timestamps, addresses)
//!   normalized away before hashing, so log variants share one pattern
//! - **Pattern Clustering**: TF-IDF vectorization with density-based
//!   clustering groups similar patterns without training
//! - **Anomaly Detection**: rate spikes, error surges, and never-before-seen
//!   patterns, each with a confidence score
//! - **Safe Policies**: every policy is validated so errors are always kept,
//!   whatever the recommendation source suggested
//! - **Hot-Path Sampler**: synchronous decisions with no inline I/O, backed
//!   by background policy refresh and pattern reporting
//!
//! # Architecture
//!
//! - `signature`: message normalization and pattern hashing
//! - `cache`: bounded memoization of computed signatures
//! - `analysis`: clustering, anomaly detection, batch summaries
//! - `policy`: sampling policies, providers, and generation
//! - `sampler`: the runtime decision engine
//! - `core`: configuration, errors, and domain types
//!
//! # Example
//!
//! ```no_run
//! use logsift::analysis::LogAnalyzer;
//! use logsift::core::{LogRecord, Severity};
//! use std::collections::HashSet;
//!
//! let analyzer = LogAnalyzer::default();
//! let logs = vec![
//!     LogRecord::new("User 42 logged in", Severity::Info, "auth"),
//!     LogRecord::new("DbError: connection refused", Severity::Error, "auth"),
//! ];
//! let result = analyzer.analyze(&logs, &HashSet::new());
//! println!("{} unique patterns", result.summary.unique_patterns);
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod analysis;
pub mod cache;
pub mod core;
pub mod policy;
pub mod sampler;
pub mod signature;

// Re-export core types for convenience
pub use crate::core::{Config, LogsiftError, Result};
