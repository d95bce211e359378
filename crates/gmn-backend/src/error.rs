//! Backend error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response at stream open; the status code stays in the
    /// message so the retryable predicate can see it
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("request timed out")]
    Timeout,

    #[error("all fallback models failed")]
    FallbackExhausted,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BackendError {
    /// Whether the fallback policy may rotate to the next model
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            _ => crate::fallback::is_retryable(&self.to_string()),
        }
    }
}
