use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl LlmError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::Network(_) => true,
            LlmError::Timeout(_) => true,
            LlmError::InvalidResponse(_) => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<LlmError> for crate::errors::CoreError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimited { retry_after } => {
                crate::errors::CoreError::RateLimit { retry_after_ms: retry_after.as_millis() as u64 }
            }
            LlmError::Network(_) | LlmError::Timeout(_) => crate::errors::CoreError::Network(err.to_string()),
            other => crate::errors::CoreError::AgentExecutionFailed(other.to_string()),
        }
    }
}
