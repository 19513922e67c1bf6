use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {session_id} timed out after {elapsed_ms}ms")]
    Timeout { session_id: String, elapsed_ms: u64 },

    #[error("task {task_id} failed: {message}")]
    TaskFailed { task_id: String, message: String },

    #[error("store error: {0}")]
    Store(#[from] taskstore::StoreError),

    #[error("at capacity: {running}/{max} sessions already running")]
    AtCapacity { running: usize, max: usize },
}

impl From<SessionError> for crate::errors::CoreError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Timeout { elapsed_ms, .. } => crate::errors::CoreError::SessionTimeout { elapsed_ms },
            SessionError::TaskFailed { message, .. } => crate::errors::CoreError::AgentExecutionFailed(message),
            SessionError::Store(e) => crate::errors::CoreError::Internal(e.to_string()),
            SessionError::AtCapacity { running, max } => {
                crate::errors::CoreError::PreconditionMissing(format!("session capacity reached ({running}/{max})"))
            }
        }
    }
}
