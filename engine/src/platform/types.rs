use serde::{Deserialize, Serialize};

use crate::domain::{Label, WorkItem};

/// A named field update sent back to the platform, e.g. swapping the
/// `state:` label or posting a comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelPatch {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl LabelPatch {
    pub fn set_state(facet_prefix: &str, new_value: &str, current: &[Label]) -> Self {
        let remove = current
            .iter()
            .filter(|l| l.logical_name().starts_with(facet_prefix))
            .map(|l| l.0.clone())
            .collect();
        LabelPatch {
            add: vec![format!("{facet_prefix}{new_value}")],
            remove,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestDraft {
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
}

/// A new work item to create on the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueDraft {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub number: u64,
    pub title: String,
}

/// Page of open/closed pull requests returned by `list_pull_requests`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestPage {
    pub items: Vec<PullRequest>,
    pub next_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub remaining: u32,
    pub limit: u32,
    pub reset_at_ms: i64,
}

/// Page of open/closed work items returned by `list_work_items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemPage {
    pub items: Vec<WorkItem>,
    pub next_page: Option<u32>,
}
