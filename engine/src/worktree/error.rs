use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("failed to create worktree: {0}")]
    CreateFailed(String),

    #[error("failed to remove worktree: {0}")]
    RemoveFailed(String),

    #[error("rebase conflict in worktree: {0}")]
    RebaseConflict(String),

    #[error("worktree not found: {0}")]
    NotFound(u64),

    #[error("worktree corrupted: {0}")]
    Corrupted(u64),

    #[error("disk space error: {0}")]
    DiskSpace(String),

    #[error("git command failed: {0}")]
    GitError(String),

    #[error(transparent)]
    Store(#[from] taskstore::StoreError),
}

impl From<WorktreeError> for crate::errors::CoreError {
    fn from(err: WorktreeError) -> Self {
        crate::errors::CoreError::Internal(err.to_string())
    }
}
