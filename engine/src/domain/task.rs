use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use taskstore::{IndexValue, Record, now_ms};

use super::agent::AgentKind;
use super::id::generate_id;

/// Severity classification, most severe first so `Severity::Critical <
/// Severity::Low` sorts critical tasks to the front of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "1-Critical",
            Severity::High => "2-High",
            Severity::Medium => "3-Medium",
            Severity::Low => "4-Low",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
    Critical,
}

/// Status of a single task. Tasks are immutable except for this field once
/// created by the DAG Builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Idle,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Idle => "idle",
            TaskStatus::Ready => "ready",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// A unit of agent work produced by the DAG Builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub type_tag: String,
    /// Lower value means higher priority.
    pub priority: i32,
    pub severity: Severity,
    pub impact: Impact,
    pub agent_kind: AgentKind,
    /// Ids of tasks that must complete before this one is ready.
    pub dependencies: Vec<String>,
    pub estimated_duration_minutes: u32,
    pub status: TaskStatus,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn new(title: impl Into<String>, type_tag: impl Into<String>, agent_kind: AgentKind) -> Self {
        let title = title.into();
        let now = now_ms();
        Self {
            id: generate_id("task", &title),
            title,
            description: String::new(),
            type_tag: type_tag.into(),
            priority: 5,
            severity: Severity::Medium,
            impact: Impact::Medium,
            agent_kind,
            dependencies: Vec::new(),
            estimated_duration_minutes: 30,
            status: TaskStatus::Idle,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_dependency(&mut self, task_id: impl Into<String>) {
        self.dependencies.push(task_id.into());
        self.updated_at = now_ms();
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = now_ms();
    }

    pub fn is_ready(&self, completed: &[&str]) -> bool {
        self.status == TaskStatus::Idle && self.dependencies.iter().all(|d| completed.contains(&d.as_str()))
    }
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "tasks"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("agent_kind".to_string(), IndexValue::String(self.agent_kind.to_string()));
        fields.insert("priority".to_string(), IndexValue::Int(self.priority as i64));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_ready_requires_all_dependencies_complete() {
        let mut t = Task::new("Implement widget", "feature", AgentKind::CodeGen);
        t.add_dependency("dep-1");
        t.add_dependency("dep-2");
        assert!(!t.is_ready(&["dep-1"]));
        assert!(t.is_ready(&["dep-1", "dep-2"]));
    }

    #[test]
    fn severity_ordering_puts_critical_first() {
        let mut severities = vec![Severity::Low, Severity::Critical, Severity::Medium];
        severities.sort();
        assert_eq!(severities, vec![Severity::Critical, Severity::Medium, Severity::Low]);
    }
}
