//! Error types for the engine

use std::time::Duration;
use thiserror::Error;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// WebSocket connection errors
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    /// WebSocket send/receive errors
    #[error("WebSocket communication error: {0}")]
    WebSocketCommunication(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Authentication/signing errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded: {message}, retry after {retry_after_seconds:?} seconds")]
    RateLimit {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    /// Every attempt allowed by the retry policy failed
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Malformed feed input (unparseable score, missing fields)
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Market not found
    #[error("Market not found: {0}")]
    MarketNotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Transient transport faults that the retry policy may retry with a fixed delay
    pub fn is_transport(&self) -> bool {
        match self {
            EngineError::HttpRequest(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, EngineError::RateLimit { .. })
    }

    /// Server-requested wait carried by a rate-limit response
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            EngineError::RateLimit {
                retry_after_seconds: Some(seconds),
                ..
            } => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for EngineError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        EngineError::WebSocketCommunication(err.to_string())
    }
}
