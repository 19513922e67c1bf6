use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use taskstore::{IndexValue, Record, now_ms};

use super::agent::AgentKind;
use super::execution_context::ExecutionContext;

/// Status of the agent currently (or most recently) bound to a worktree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Working,
    Blocked,
    Done,
    Error,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Working => "working",
            AgentStatus::Blocked => "blocked",
            AgentStatus::Done => "done",
            AgentStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// An isolated repository checkout bound to one issue for the lifetime of
/// one session. Ownership is exclusive: destroyed on reap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreeInfo {
    /// Decimal string form of `issue_number`; the store key, since
    /// `Record::id` must return a borrowed `&str`.
    pub id: String,
    pub issue_number: u64,
    pub path: String,
    pub branch_name: String,
    pub agent_kind: AgentKind,
    pub agent_status: AgentStatus,
    pub execution_context: Option<ExecutionContext>,
    pub created_at: i64,
    pub last_active_at: i64,
}

impl WorktreeInfo {
    pub fn new(issue_number: u64, path: String, branch_name: String, agent_kind: AgentKind) -> Self {
        let now = now_ms();
        Self {
            id: issue_number.to_string(),
            issue_number,
            path,
            branch_name,
            agent_kind,
            agent_status: AgentStatus::Idle,
            execution_context: None,
            created_at: now,
            last_active_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_active_at = now_ms();
    }

    pub fn is_idle_longer_than(&self, max_idle_ms: i64) -> bool {
        now_ms() - self.last_active_at > max_idle_ms
    }
}

impl Record for WorktreeInfo {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.last_active_at
    }

    fn collection_name() -> &'static str {
        "worktrees"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("agent_kind".to_string(), IndexValue::String(self.agent_kind.to_string()));
        fields.insert(
            "agent_status".to_string(),
            IndexValue::String(self.agent_status.to_string()),
        );
        fields.insert("issue_number".to_string(), IndexValue::Int(self.issue_number as i64));
        fields
    }
}

/// Aggregate counts returned by `WorktreeManager::get_agent_statistics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStatistics {
    pub total: usize,
    pub by_kind: HashMap<String, usize>,
    pub by_status: HashMap<String, usize>,
}

impl AgentStatistics {
    pub fn from_worktrees<'a>(worktrees: impl IntoIterator<Item = &'a WorktreeInfo>) -> Self {
        let mut stats = AgentStatistics::default();
        for wt in worktrees {
            stats.total += 1;
            *stats.by_kind.entry(wt.agent_kind.to_string()).or_insert(0) += 1;
            *stats.by_status.entry(wt.agent_status.to_string()).or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_the_decimal_issue_number() {
        let wt = WorktreeInfo::new(482, "/tmp/wt-482".into(), "agent/codegen-482".into(), AgentKind::CodeGen);
        assert_eq!(wt.id(), "482");
    }

    #[test]
    fn idle_longer_than_is_false_right_after_touch() {
        let mut wt = WorktreeInfo::new(1, "/tmp/wt-1".into(), "agent/issue-1".into(), AgentKind::Issue);
        wt.touch();
        assert!(!wt.is_idle_longer_than(60_000));
    }

    #[test]
    fn statistics_aggregate_by_kind_and_status() {
        let a = WorktreeInfo::new(1, "/a".into(), "b/1".into(), AgentKind::CodeGen);
        let b = WorktreeInfo::new(2, "/b".into(), "b/2".into(), AgentKind::CodeGen);
        let stats = AgentStatistics::from_worktrees([&a, &b]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_kind.get("CodeGen"), Some(&2));
    }
}
