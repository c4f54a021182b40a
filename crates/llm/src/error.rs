use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("stream ended unexpectedly: {0}")]
    StreamClosed(String),

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether a retry with backoff is worth attempting, mirroring the
    /// teacher's `is_retryable` classification on its backend errors.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Timeout | Self::StreamClosed(_))
    }
}
