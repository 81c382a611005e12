//! Error types for Substats
//!
//! Provides a unified error type and the remote-billing error variants

use thiserror::Error;

/// Result type alias using AnalyticsError
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Unified error type for analytics operations
#[derive(Debug, Error)]
pub enum AnalyticsError {
    // Remote billing API errors
    #[error("Remote billing error: {0}")]
    Remote(#[from] RemoteError),

    // Missing anti-forgery token or capability
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Required setting absent (API key, recipients)
    #[error("{0}")]
    NotConfigured(String),

    // Cache / key-value storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Mail delivery errors
    #[error("Mail delivery failed: {0}")]
    Mail(String),

    // Configuration parsing errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalyticsError {
    /// Whether the error came from the remote billing API
    pub fn is_remote(&self) -> bool {
        matches!(self, AnalyticsError::Remote(_))
    }
}

/// Remote billing API errors
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("rate limited by remote API")]
    RateLimited,

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        AnalyticsError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AnalyticsError {
    fn from(err: std::io::Error) -> Self {
        AnalyticsError::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for AnalyticsError {
    fn from(err: anyhow::Error) -> Self {
        AnalyticsError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = AnalyticsError::Remote(RemoteError::Api {
            status: 401,
            message: "Invalid API Key provided".to_string(),
        });
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("Invalid API Key"));
        assert!(err.is_remote());
    }

    #[test]
    fn test_not_configured_is_verbatim() {
        let err = AnalyticsError::NotConfigured("No recipients configured".to_string());
        assert_eq!(err.to_string(), "No recipients configured");
        assert!(!err.is_remote());
    }
}
