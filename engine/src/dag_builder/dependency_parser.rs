//! Deterministic extraction of task dependencies from free-text task
//! descriptions. Three fixed patterns are recognized; anything else is
//! left for the caller to resolve manually.

use std::sync::LazyLock;

use regex::Regex;

static DEPENDS_ON_ISSUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)depends on #(\d+)").expect("valid regex"));
static AFTER_TASK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)after task (\S+)").expect("valid regex"));
static BLOCKED_BY_ISSUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)blocked by #(\d+)").expect("valid regex"));

/// A dependency reference extracted from text, not yet resolved to a
/// task id in the current decomposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyRef {
    /// References another work item by number, e.g. "depends on #42".
    IssueNumber(u64),
    /// References a task within the same decomposition by its own
    /// free-text id, e.g. "after task setup-schema".
    TaskId(String),
}

/// Scan `text` for the three recognized dependency phrasings and return
/// every match, in the order found. Duplicate phrasings collapse once.
pub fn extract_dependencies(text: &str) -> Vec<DependencyRef> {
    let mut refs = Vec::new();

    for cap in DEPENDS_ON_ISSUE.captures_iter(text) {
        if let Ok(n) = cap[1].parse() {
            refs.push(DependencyRef::IssueNumber(n));
        }
    }
    for cap in BLOCKED_BY_ISSUE.captures_iter(text) {
        if let Ok(n) = cap[1].parse() {
            let parsed = DependencyRef::IssueNumber(n);
            if !refs.contains(&parsed) {
                refs.push(parsed);
            }
        }
    }
    for cap in AFTER_TASK.captures_iter(text) {
        refs.push(DependencyRef::TaskId(cap[1].to_string()));
    }

    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_depends_on_issue_number() {
        let refs = extract_dependencies("This depends on #42 and nothing else.");
        assert_eq!(refs, vec![DependencyRef::IssueNumber(42)]);
    }

    #[test]
    fn extracts_after_task_reference() {
        let refs = extract_dependencies("Run this after task setup-schema.");
        assert_eq!(refs, vec![DependencyRef::TaskId("setup-schema".to_string())]);
    }

    #[test]
    fn blocked_by_is_treated_like_depends_on_and_deduped() {
        let refs = extract_dependencies("blocked by #7, also depends on #7");
        assert_eq!(refs, vec![DependencyRef::IssueNumber(7)]);
    }

    #[test]
    fn text_with_no_markers_yields_nothing() {
        assert!(extract_dependencies("Just a plain task description.").is_empty());
    }

    #[test]
    fn combines_multiple_distinct_markers() {
        let refs = extract_dependencies("depends on #1, after task build-api");
        assert_eq!(
            refs,
            vec![DependencyRef::IssueNumber(1), DependencyRef::TaskId("build-api".to_string())]
        );
    }
}
