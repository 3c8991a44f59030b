use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed field `{field}`: {message}")]
    Normalization { field: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    pub fn normalization(field: &str, message: impl Into<String>) -> Self {
        Self::Normalization {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Whether a refresh cycle that failed with this error may be retried on
    /// the next interval. Only meaningful once a first snapshot exists.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Api { .. }
                | Self::Network(_)
                | Self::Json(_)
                | Self::Normalization { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_error_names_field() {
        let err = MonitorError::normalization("completed_on", "invalid timestamp 'yesterday'");
        assert!(err.to_string().contains("completed_on"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_fatal_errors_are_not_retryable() {
        assert!(!MonitorError::NotFound("pipeline {abc}".to_string()).is_retryable());
        assert!(!MonitorError::Config("missing repo".to_string()).is_retryable());
        assert!(!MonitorError::Io(std::io::Error::other("broken pipe")).is_retryable());
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(MonitorError::Transport("connection reset".to_string()).is_retryable());
        assert!(MonitorError::Api {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_retryable());
    }
}
