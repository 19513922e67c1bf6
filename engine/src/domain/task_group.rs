use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use taskstore::{IndexValue, Record, now_ms};

use super::agent::AgentKind;
use super::id::generate_id;

/// Scheduler-level status of a `TaskGroup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    #[default]
    Waiting,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl GroupStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GroupStatus::Completed | GroupStatus::Failed | GroupStatus::Skipped)
    }
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GroupStatus::Waiting => "waiting",
            GroupStatus::Running => "running",
            GroupStatus::Completed => "completed",
            GroupStatus::Failed => "failed",
            GroupStatus::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// A cohort of tasks sharing one agent kind, one worktree and one session.
/// Tasks execute sequentially inside the session in `task_ids` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGroup {
    pub id: String,
    pub agent_kind: AgentKind,
    pub task_ids: Vec<String>,
    /// Ids of groups that must reach `completed` before this one is
    /// dispatchable.
    pub depends_on_groups: Vec<String>,
    pub dag_level: usize,
    pub priority: i32,
    pub status: GroupStatus,
    pub retry_count: u32,
    pub skip_reason: Option<String>,
    pub enqueued_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub updated_at: i64,
}

impl TaskGroup {
    pub fn new(agent_kind: AgentKind, task_ids: Vec<String>, dag_level: usize, priority: i32) -> Self {
        let now = now_ms();
        Self {
            id: generate_id("group", &agent_kind.to_string()),
            agent_kind,
            task_ids,
            depends_on_groups: Vec::new(),
            dag_level,
            priority,
            status: GroupStatus::Waiting,
            retry_count: 0,
            skip_reason: None,
            enqueued_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    pub fn start(&mut self) {
        self.status = GroupStatus::Running;
        self.started_at = Some(now_ms());
        self.updated_at = now_ms();
    }

    pub fn complete(&mut self) {
        self.status = GroupStatus::Completed;
        self.completed_at = Some(now_ms());
        self.updated_at = now_ms();
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.status = GroupStatus::Skipped;
        self.skip_reason = Some(reason.into());
        self.updated_at = now_ms();
    }

    pub fn fail(&mut self) {
        self.status = GroupStatus::Failed;
        self.updated_at = now_ms();
    }

    pub fn retry(&mut self) {
        self.status = GroupStatus::Waiting;
        self.retry_count += 1;
        self.started_at = None;
        self.updated_at = now_ms();
    }
}

impl Record for TaskGroup {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "task_groups"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("dag_level".to_string(), IndexValue::Int(self.dag_level as i64));
        fields.insert("priority".to_string(), IndexValue::Int(self.priority as i64));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_resets_to_waiting_and_counts_attempts() {
        let mut g = TaskGroup::new(AgentKind::CodeGen, vec!["task-1".into()], 0, 5);
        g.start();
        g.fail();
        assert_eq!(g.status, GroupStatus::Failed);
        g.retry();
        assert_eq!(g.status, GroupStatus::Waiting);
        assert_eq!(g.retry_count, 1);
        assert!(g.started_at.is_none());
    }

    #[test]
    fn terminal_states_are_recognized() {
        let mut g = TaskGroup::new(AgentKind::Review, vec!["task-1".into()], 1, 5);
        assert!(!g.status.is_terminal());
        g.skip("no dependents ready");
        assert!(g.status.is_terminal());
        assert_eq!(g.skip_reason.as_deref(), Some("no dependents ready"));
    }
}
