use std::time::Duration;

use thiserror::Error;

/// Errors raised by the Platform Gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::RateLimited { .. } => true,
            GatewayError::ApiError { status, .. } => *status >= 500,
            GatewayError::Network(_) => true,
            GatewayError::InvalidResponse(_) | GatewayError::NotFound(_) | GatewayError::Json(_) => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<GatewayError> for crate::errors::CoreError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::RateLimited { retry_after } => crate::errors::CoreError::RateLimit {
                retry_after_ms: retry_after.as_millis() as u64,
            },
            GatewayError::NotFound(msg) => crate::errors::CoreError::PreconditionMissing(msg),
            other => crate::errors::CoreError::Network(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        assert!(GatewayError::ApiError { status: 503, message: "busy".into() }.is_retryable());
        assert!(!GatewayError::ApiError { status: 404, message: "missing".into() }.is_retryable());
    }
}
