use crate::core::error::{LogsiftError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Log severity levels, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    Fatal,
}

impl Severity {
    /// Returns true for severities that must always be retained,
    /// regardless of any sampling policy.
    pub fn is_always_kept(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical | Severity::Fatal)
    }

    /// Canonical upper-case name, as used in policies and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Fatal => "FATAL",
        }
    }
}

impl FromStr for Severity {
    type Err = LogsiftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" => Ok(Severity::Critical),
            "FATAL" => Ok(Severity::Fatal),
            other => Err(LogsiftError::InvalidRecord(format!(
                "unknown severity: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable fingerprint of a normalized log message.
///
/// Two messages that differ only in embedded variables (numbers, UUIDs,
/// timestamps, IPs, emails, URLs) carry the same signature. Always 32
/// lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(String);

impl Signature {
    /// Wraps a precomputed digest. Internal to the signature engine.
    pub(crate) fn from_digest(digest: String) -> Self {
        Signature(digest)
    }

    /// Returns the hex representation of the signature
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the inner string value
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single log event supplied by a collaborator for analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Raw log message text.
    pub message: String,
    /// Severity level.
    pub severity: Severity,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Originating service or component.
    pub source: String,
}

impl LogRecord {
    /// Convenience constructor stamped with the current time.
    pub fn new(message: impl Into<String>, severity: Severity, source: impl Into<String>) -> Self {
        LogRecord {
            message: message.into(),
            severity,
            timestamp: Utc::now(),
            source: source.into(),
        }
    }
}
