//! Work items and their label facets.
//!
//! A work item carries an ordered set of label names partitioned into
//! orthogonal facets (state, type, priority, agent-owner, phase). The
//! State facet is the single authoritative progress marker; the others
//! only influence scheduling.

use serde::{Deserialize, Serialize};

use super::agent::AgentKind;

/// Lifecycle position of a work item. The sole authoritative progress
/// marker; every other facet only influences scheduling priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum State {
    #[default]
    Pending,
    Analyzing,
    Implementing,
    Reviewing,
    Done,
    Blocked,
    Paused,
}

impl State {
    /// True once a work item can no longer progress further.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Done)
    }

    /// Strip a cosmetic pseudographic prefix (e.g. `"\u{1F4E5} state:pending"`)
    /// down to the logical label name before comparison.
    pub fn parse_label(label: &str) -> Option<State> {
        let logical = label.rsplit(':').next().unwrap_or(label).trim();
        match logical.to_lowercase().as_str() {
            "pending" => Some(State::Pending),
            "analyzing" => Some(State::Analyzing),
            "implementing" => Some(State::Implementing),
            "reviewing" => Some(State::Reviewing),
            "done" => Some(State::Done),
            "blocked" => Some(State::Blocked),
            "paused" => Some(State::Paused),
            _ => None,
        }
    }

    /// Extract the State facet from a work item's label set. A missing
    /// State label is semantically equivalent to `pending`.
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> State {
        labels.into_iter().find_map(State::parse_label).unwrap_or_default()
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::Pending => "pending",
            State::Analyzing => "analyzing",
            State::Implementing => "implementing",
            State::Reviewing => "reviewing",
            State::Done => "done",
            State::Blocked => "blocked",
            State::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

/// Priority facet, distinct from a task's scheduling integer: this is the
/// label a human attaches to the work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityLabel {
    P0Critical,
    P1High,
    P2Medium,
    P3Low,
}

impl PriorityLabel {
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.to_uppercase().as_str() {
            "P0-CRITICAL" | "P0" => Some(Self::P0Critical),
            "P1-HIGH" | "P1" => Some(Self::P1High),
            "P2-MEDIUM" | "P2" => Some(Self::P2Medium),
            "P3-LOW" | "P3" => Some(Self::P3Low),
            _ => None,
        }
    }
}

/// Deployment-pipeline facet: which stage of the pipeline a work item is
/// currently in. Orthogonal to `State`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseFacet {
    Planning,
    Development,
    Testing,
    Deployment,
}

/// A label name as it appears on the platform, with its cosmetic prefix
/// (if any) already stripped for comparison purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label(pub String);

impl Label {
    /// The logical name after any pseudographic prefix, used for all
    /// facet comparisons.
    pub fn logical_name(&self) -> &str {
        self.0.rsplit(' ').next().unwrap_or(&self.0)
    }
}

/// Immutable snapshot of a work item as read from the Platform Gateway.
/// Mutation only happens via the Gateway; this struct never self-mutates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub body: String,
    pub open: bool,
    pub labels: Vec<Label>,
    pub assignee: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub url: String,
}

impl WorkItem {
    /// The authoritative State facet, defaulting to `pending` when absent.
    pub fn state(&self) -> State {
        State::from_labels(self.labels.iter().map(|l| l.logical_name()))
    }

    pub fn priority_label(&self) -> Option<PriorityLabel> {
        self.labels.iter().find_map(|l| PriorityLabel::parse_label(l.logical_name()))
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.logical_name().eq_ignore_ascii_case(name))
    }

    /// Type facet value, e.g. `feature`, `bug`, `docs`. `None` when the
    /// item carries no recognized `type:` label.
    pub fn type_tag(&self) -> Option<&str> {
        self.labels.iter().find_map(|l| {
            let logical = l.logical_name();
            logical.strip_prefix("type:")
        })
    }

    /// The agent-owner facet, if the item is explicitly labeled.
    pub fn agent_owner(&self) -> Option<AgentKind> {
        self.labels
            .iter()
            .find_map(|l| l.logical_name().strip_prefix("agent:").and_then(|s| s.parse().ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with_labels(labels: &[&str]) -> WorkItem {
        WorkItem {
            owner: "acme".into(),
            repo: "widgets".into(),
            number: 7,
            title: "t".into(),
            body: "b".into(),
            open: true,
            labels: labels.iter().map(|s| Label(s.to_string())).collect(),
            assignee: None,
            created_at: 0,
            updated_at: 0,
            url: "https://example.test/7".into(),
        }
    }

    #[test]
    fn missing_state_label_defaults_to_pending() {
        let item = item_with_labels(&["type:feature"]);
        assert_eq!(item.state(), State::Pending);
    }

    #[test]
    fn explicit_state_label_wins() {
        let item = item_with_labels(&["state:analyzing", "type:bug"]);
        assert_eq!(item.state(), State::Analyzing);
    }

    #[test]
    fn pseudographic_prefix_is_ignored() {
        let item = item_with_labels(&["\u{1F4E5} state:pending"]);
        assert_eq!(item.state(), State::Pending);
    }

    #[test]
    fn priority_label_parses_both_forms() {
        assert_eq!(PriorityLabel::parse_label("P0-Critical"), Some(PriorityLabel::P0Critical));
        assert_eq!(PriorityLabel::parse_label("p1"), Some(PriorityLabel::P1High));
        assert_eq!(PriorityLabel::parse_label("bogus"), None);
    }
}
