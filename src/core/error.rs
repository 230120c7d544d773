use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogsiftError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Recommendation provider error: {0}")]
    Provider(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Policy not found for service: {0}")]
    PolicyNotFound(String),

    #[error("Sampling rate must be between 0.0 and 1.0, got {0}")]
    InvalidSamplingRate(f64),

    #[error("Invalid log record: {0}")]
    InvalidRecord(String),

    #[error("Sampler is already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Timeout error: operation took longer than {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Result type alias for logsift operations
pub type Result<T> = std::result::Result<T, LogsiftError>;

impl LogsiftError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new provider error
    pub fn provider<S: Into<String>>(msg: S) -> Self {
        Self::Provider(msg.into())
    }

    /// Creates a new transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a new analysis error
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        Self::Analysis(msg.into())
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::PolicyNotFound(_)
        )
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Provider(_) => "provider",
            Self::Transport(_) => "transport",
            Self::Analysis(_) => "analysis",
            Self::PolicyNotFound(_) => "not_found",
            Self::InvalidSamplingRate(_) | Self::InvalidRecord(_) => "validation",
            Self::AlreadyRunning => "state",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Join(_) => "async",
            Self::Timeout { .. } => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LogsiftError::provider("model unavailable");
        assert_eq!(err.to_string(), "Recommendation provider error: model unavailable");
        assert_eq!(err.category(), "provider");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(LogsiftError::transport("connection refused").is_recoverable());
        assert!(LogsiftError::Timeout { timeout_ms: 5000 }.is_recoverable());
        assert!(!LogsiftError::config("bad interval").is_recoverable());
        assert!(!LogsiftError::InvalidSamplingRate(1.5).is_recoverable());
    }
}
