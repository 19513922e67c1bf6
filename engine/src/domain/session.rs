use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use taskstore::{IndexValue, Record, now_ms};

use super::id::generate_id;

/// Lifecycle of a bound execution of one `TaskGroup` in one worktree.
/// `initializing -> running -> {completed, failed, timeout}`; no
/// transition leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Initializing,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Timeout)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Initializing => "initializing",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Timeout => "timeout",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    pub message: String,
}

/// Binds a `TaskGroup` to a worktree for one bounded run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub group_id: String,
    pub worktree_path: String,
    pub status: SessionStatus,
    pub task_results: Vec<TaskResult>,
    pub error: Option<String>,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub updated_at: i64,
}

impl Session {
    pub fn new(group_id: impl Into<String>, worktree_path: impl Into<String>) -> Self {
        let group_id = group_id.into();
        let now = now_ms();
        Self {
            id: generate_id("session", &group_id),
            group_id,
            worktree_path: worktree_path.into(),
            status: SessionStatus::Initializing,
            task_results: Vec::new(),
            error: None,
            start_time: now,
            end_time: None,
            updated_at: now,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = SessionStatus::Running;
        self.updated_at = now_ms();
    }

    pub fn complete(&mut self, task_results: Vec<TaskResult>) {
        self.status = SessionStatus::Completed;
        self.task_results = task_results;
        self.end_time = Some(now_ms());
        self.updated_at = now_ms();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = SessionStatus::Failed;
        self.error = Some(error.into());
        self.end_time = Some(now_ms());
        self.updated_at = now_ms();
    }

    pub fn timeout(&mut self) {
        self.status = SessionStatus::Timeout;
        self.error = Some("session exceeded sessionTimeoutMs".to_string());
        self.end_time = Some(now_ms());
        self.updated_at = now_ms();
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.end_time.unwrap_or_else(now_ms) - self.start_time
    }
}

impl Record for Session {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "sessions"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("group_id".to_string(), IndexValue::String(self.group_id.clone()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_initializing() {
        let s = Session::new("group-1", "/tmp/wt-1");
        assert_eq!(s.status, SessionStatus::Initializing);
        assert!(!s.status.is_terminal());
    }

    #[test]
    fn timeout_sets_terminal_status_and_error() {
        let mut s = Session::new("group-1", "/tmp/wt-1");
        s.mark_running();
        s.timeout();
        assert_eq!(s.status, SessionStatus::Timeout);
        assert!(s.status.is_terminal());
        assert!(s.error.is_some());
        assert!(s.end_time.is_some());
    }

    #[test]
    fn complete_records_task_results() {
        let mut s = Session::new("group-1", "/tmp/wt-1");
        s.mark_running();
        s.complete(vec![TaskResult {
            task_id: "task-1".into(),
            success: true,
            message: "done".into(),
        }]);
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.task_results.len(), 1);
    }
}
