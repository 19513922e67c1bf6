use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::task::Task;
use super::work_item::WorkItem;

/// Everything an agent run needs, materialized into the worktree as two
/// files: a machine-readable form (`.agent-context.json`) and a
/// human-readable plan (`EXECUTION_CONTEXT.md`/`plans.md`). The plan is
/// the sole trajectory-of-record a resumed or inspected session reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub task: Task,
    pub work_item: WorkItem,
    pub rendered_prompt: String,
    pub config_subset: serde_json::Value,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ExecutionContext {
    pub fn new(task: Task, work_item: WorkItem, rendered_prompt: String) -> Self {
        Self {
            task,
            work_item,
            rendered_prompt,
            config_subset: serde_json::Value::Null,
            metadata: HashMap::new(),
        }
    }

    /// Render the human-readable plan (`plans.md`/`EXECUTION_CONTEXT.md`).
    pub fn render_plan_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!("# Execution Context: {}\n\n", self.task.title));
        md.push_str(&format!(
            "Work item: {}/{}#{}\n\n",
            self.work_item.owner, self.work_item.repo, self.work_item.number
        ));
        md.push_str(&format!("Agent: {}\n\n", self.task.agent_kind));
        md.push_str("## Task\n\n");
        md.push_str(&self.task.description);
        md.push_str("\n\n## Prompt\n\n");
        md.push_str(&self.rendered_prompt);
        md.push('\n');
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentKind;
    use crate::domain::work_item::WorkItem;

    #[test]
    fn rendered_plan_includes_task_title_and_work_item_reference() {
        let task = Task::new("Fix crash on empty input", "bug", AgentKind::CodeGen);
        let work_item = WorkItem {
            owner: "acme".into(),
            repo: "widgets".into(),
            number: 42,
            title: "Crash on empty input".into(),
            body: String::new(),
            open: true,
            labels: Vec::new(),
            assignee: None,
            created_at: 0,
            updated_at: 0,
            url: "https://example.invalid/acme/widgets/issues/42".into(),
        };
        let ctx = ExecutionContext::new(task, work_item, "Write a fix.".into());
        let md = ctx.render_plan_markdown();
        assert!(md.contains("Fix crash on empty input"));
        assert!(md.contains("acme/widgets#42"));
        assert!(md.contains("Write a fix."));
    }
}
