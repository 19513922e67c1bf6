//! DAG Builder: turns a work item into a task set and wires up
//! dependencies, either from a structured checklist in its body or from
//! LLM-assisted decomposition of free-text prose, then stratifies the
//! result into a DAG and groups tasks into dispatchable `TaskGroup`s.

mod dependency_parser;

pub use dependency_parser::{DependencyRef, extract_dependencies};

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::{AgentKind, Dag, Task, TaskGroup, WorkItem, build_dag};

static CHECKLIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*-\s*\[( |x|X)\]\s*(.+)$").expect("valid regex"));

/// A single decomposed unit of work, as produced by an `IssueDecomposer`
/// before it is materialized into a persisted `Task`.
#[derive(Debug, Clone)]
pub struct TaskOutline {
    pub title: String,
    pub description: String,
    pub agent_kind: AgentKind,
}

/// LLM-assisted decomposition of issue prose into a task outline, used
/// only when the issue body carries no structured checklist.
#[async_trait]
pub trait IssueDecomposer: Send + Sync {
    async fn decompose(&self, work_item: &WorkItem) -> Result<Vec<TaskOutline>, String>;
}

/// Build the initial task set for `work_item`. Prefers a structured
/// checklist (`- [ ] ...` lines) when present, since it is deterministic
/// and author-authored; falls back to `decomposer` otherwise.
pub async fn build_tasks(work_item: &WorkItem, decomposer: &dyn IssueDecomposer) -> Result<Vec<Task>, String> {
    let outlines = match parse_checklist(&work_item.body) {
        Some(items) => items,
        None => decomposer.decompose(work_item).await?,
    };

    if outlines.is_empty() {
        return Err("decomposition produced zero tasks".to_string());
    }

    let mut tasks: Vec<Task> = outlines
        .into_iter()
        .map(|outline| {
            let mut task = Task::new(outline.title, work_item.type_tag().unwrap_or("feature"), outline.agent_kind);
            task.description = outline.description;
            task.priority = work_item.priority_label().map(priority_rank).unwrap_or(5);
            task
        })
        .collect();

    wire_intra_item_dependencies(&mut tasks);
    Ok(tasks)
}

/// Parse a GitHub-flavored checklist out of an issue body. Returns
/// `None` when no checklist item is found, so the caller can fall back
/// to LLM decomposition.
fn parse_checklist(body: &str) -> Option<Vec<TaskOutline>> {
    let items: Vec<TaskOutline> = CHECKLIST_ITEM
        .captures_iter(body)
        .map(|cap| {
            let title = cap[2].trim().to_string();
            TaskOutline { title, description: String::new(), agent_kind: AgentKind::CodeGen }
        })
        .collect();

    if items.is_empty() { None } else { Some(items) }
}

fn priority_rank(label: crate::domain::PriorityLabel) -> i32 {
    use crate::domain::PriorityLabel::*;
    match label {
        P0Critical => 1,
        P1High => 3,
        P2Medium => 5,
        P3Low => 8,
    }
}

/// Resolve free-text dependency phrasings against the other tasks in
/// this decomposition. `depends on #N` and `blocked by #N` reference
/// another work item and are recorded in task metadata rather than as an
/// intra-DAG edge, since issue number 42 may not correspond to any task
/// id here.
fn wire_intra_item_dependencies(tasks: &mut [Task]) {
    let title_to_id: HashMap<String, String> =
        tasks.iter().map(|t| (dependency_parser_key(&t.title), t.id.clone())).collect();

    for task in tasks.iter_mut() {
        for dep in extract_dependencies(&task.description.clone()) {
            match dep {
                DependencyRef::TaskId(id) => {
                    if let Some(resolved) = title_to_id.get(&dependency_parser_key(&id))
                        && resolved != &task.id
                    {
                        task.add_dependency(resolved.clone());
                    }
                }
                DependencyRef::IssueNumber(n) => {
                    task.metadata.insert("depends_on_issue".to_string(), serde_json::json!(n));
                }
            }
        }
    }
}

fn dependency_parser_key(s: &str) -> String {
    s.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Group a DAG's tasks into `TaskGroup`s, one per (level, agent kind)
/// pair, so the scheduler dispatches same-kind work together inside one
/// session.
pub fn group_into_task_groups(dag: &Dag) -> Vec<TaskGroup> {
    let by_id: HashMap<&str, &Task> = dag.nodes.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut groups = Vec::new();

    for (level_idx, level) in dag.levels.iter().enumerate() {
        let mut by_kind: HashMap<AgentKind, Vec<String>> = HashMap::new();
        for id in level {
            if let Some(task) = by_id.get(id.as_str()) {
                by_kind.entry(task.agent_kind).or_default().push(id.clone());
            }
        }
        for (kind, task_ids) in by_kind {
            let min_priority = task_ids
                .iter()
                .filter_map(|id| by_id.get(id.as_str()))
                .map(|t| t.priority)
                .min()
                .unwrap_or(5);
            let mut group = TaskGroup::new(kind, task_ids.clone(), level_idx, min_priority);
            if level_idx > 0 {
                group.depends_on_groups = groups
                    .iter()
                    .filter(|g: &&TaskGroup| g.dag_level == level_idx - 1)
                    .map(|g| g.id.clone())
                    .collect();
            }
            groups.push(group);
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(body: &str) -> WorkItem {
        WorkItem {
            owner: "acme".into(),
            repo: "widgets".into(),
            number: 42,
            title: "Add feature".into(),
            body: body.into(),
            open: true,
            labels: Vec::new(),
            assignee: None,
            created_at: 0,
            updated_at: 0,
            url: "https://example.test/42".into(),
        }
    }

    struct NeverCalled;

    #[async_trait]
    impl IssueDecomposer for NeverCalled {
        async fn decompose(&self, _work_item: &WorkItem) -> Result<Vec<TaskOutline>, String> {
            panic!("decomposer should not be called when a checklist is present")
        }
    }

    struct FixedOutline(Vec<TaskOutline>);

    #[async_trait]
    impl IssueDecomposer for FixedOutline {
        async fn decompose(&self, _work_item: &WorkItem) -> Result<Vec<TaskOutline>, String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn checklist_body_is_parsed_without_calling_the_decomposer() {
        let work_item = item("Plan:\n- [ ] Write migration\n- [x] Review schema\n");
        let tasks = build_tasks(&work_item, &NeverCalled).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "Write migration");
    }

    #[tokio::test]
    async fn falls_back_to_decomposer_when_no_checklist() {
        let outline = vec![TaskOutline {
            title: "Implement widget".into(),
            description: "no checklist here".into(),
            agent_kind: AgentKind::CodeGen,
        }];
        let work_item = item("Please add a widget, no structure here.");
        let tasks = build_tasks(&work_item, &FixedOutline(outline)).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Implement widget");
    }

    #[tokio::test]
    async fn cross_issue_dependency_is_recorded_as_metadata_not_an_edge() {
        let outline = vec![TaskOutline {
            title: "Implement widget".into(),
            description: "depends on #7".into(),
            agent_kind: AgentKind::CodeGen,
        }];
        let work_item = item("free text");
        let tasks = build_tasks(&work_item, &FixedOutline(outline)).await.unwrap();
        assert!(tasks[0].dependencies.is_empty());
        assert_eq!(tasks[0].metadata.get("depends_on_issue"), Some(&serde_json::json!(7)));
    }

    #[test]
    fn groups_one_level_into_one_group_per_agent_kind() {
        let mut a = Task::new("a", "feature", AgentKind::CodeGen);
        a.id = "a".into();
        let mut b = Task::new("b", "feature", AgentKind::Review);
        b.id = "b".into();
        b.dependencies = vec!["a".into()];
        let dag = build_dag(vec![a, b]);
        let groups = group_into_task_groups(&dag);
        assert_eq!(groups.len(), 2);
        assert!(groups[1].depends_on_groups.contains(&groups[0].id));
    }
}
