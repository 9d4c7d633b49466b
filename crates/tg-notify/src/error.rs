//! Error types for the notification system.

use thiserror::Error;

/// Errors that can occur when delivering a message through a channel.
///
/// These never leave the notifier: they are logged and turned into a
/// [`DeliveryOutcome::Failed`](crate::DeliveryOutcome::Failed).
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API rejected the message
    #[error("API error {code}: {description}")]
    Api { code: u16, description: String },

    /// Rate limited by the service
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Channel is not configured
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    /// Channel was closed and can no longer send
    #[error("Channel closed")]
    Closed,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the manager's own API.
///
/// Only configuration and lifecycle misuse propagate to callers; delivery
/// problems are absorbed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifierError {
    /// Required configuration is missing or malformed
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The manager was used before `configure()`
    #[error("Illegal state: {0}")]
    IllegalState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ChannelError::RateLimited {
            retry_after_secs: 7,
        };
        assert_eq!(err.to_string(), "Rate limited, retry after 7s");

        let err = ChannelError::Api {
            code: 400,
            description: "Bad Request: chat not found".to_string(),
        };
        assert_eq!(err.to_string(), "API error 400: Bad Request: chat not found");

        let err = NotifierError::Configuration("bot_token is required".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: bot_token is required"
        );
    }
}
