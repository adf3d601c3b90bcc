use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("rate limit still exhausted for {url} after {waits} waits")]
    RateLimitExhausted { url: String, waits: usize },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl DigestError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Network failures and throttling/server statuses are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}
