//! Top-level error taxonomy and process exit codes.
//!
//! Every error raised anywhere in the coordinator is eventually mapped to
//! one of these closed variants before it reaches the CLI boundary, so the
//! process exit code and the structured failure JSON stay in lockstep.

use thiserror::Error;

/// Closed error taxonomy. Each variant carries its own recoverability and
/// retry policy; see `is_recoverable` and `exit_code`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimit { retry_after_ms: u64 },

    #[error("precondition missing: {0}")]
    PreconditionMissing(String),

    #[error("agent execution failed: {0}")]
    AgentExecutionFailed(String),

    #[error("session timed out after {elapsed_ms}ms")]
    SessionTimeout { elapsed_ms: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the supervisor should retry the same unit of work rather
    /// than poisoning its dependents.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::Network(_) | CoreError::RateLimit { .. } | CoreError::SessionTimeout { .. }
        )
    }

    /// Process exit code for the CLI boundary. 0 is reserved for success
    /// and is never returned here. Matches the stable table in spec §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::Config(_) => 2,
            CoreError::Validation(_) => 3,
            CoreError::Network(_) | CoreError::RateLimit { .. } => 4,
            CoreError::Auth(_) => 5,
            CoreError::PreconditionMissing(_)
            | CoreError::AgentExecutionFailed(_)
            | CoreError::SessionTimeout { .. }
            | CoreError::Internal(_) => 1,
        }
    }

    /// The closed taxonomy tag used in structured failure JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Auth(_) => "AUTH_ERROR",
            CoreError::Network(_) => "NETWORK_ERROR",
            CoreError::RateLimit { .. } => "RATE_LIMIT",
            CoreError::PreconditionMissing(_) => "PRECONDITION_MISSING",
            CoreError::AgentExecutionFailed(_) => "AGENT_EXECUTION_FAILED",
            CoreError::SessionTimeout { .. } => "SESSION_TIMEOUT",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<taskstore::StoreError> for CoreError {
    fn from(err: taskstore::StoreError) -> Self {
        CoreError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Internal(err.to_string())
    }
}
