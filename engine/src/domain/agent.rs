use serde::{Deserialize, Serialize};

/// The closed set of agent kinds the dispatcher can resolve to a callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Coordinator,
    Issue,
    CodeGen,
    Review,
    Pr,
    Deploy,
    Test,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentKind::Coordinator => "Coordinator",
            AgentKind::Issue => "Issue",
            AgentKind::CodeGen => "CodeGen",
            AgentKind::Review => "Review",
            AgentKind::Pr => "PR",
            AgentKind::Deploy => "Deploy",
            AgentKind::Test => "Test",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coordinator" => Ok(Self::Coordinator),
            "issue" => Ok(Self::Issue),
            "codegen" | "code-gen" | "code_gen" => Ok(Self::CodeGen),
            "review" => Ok(Self::Review),
            "pr" => Ok(Self::Pr),
            "deploy" => Ok(Self::Deploy),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown agent kind: {other}")),
        }
    }
}

impl AgentKind {
    /// Map a work item's type facet to the agent kind the DAG Builder
    /// assigns a task derived from it. Unrecognized types fall back to
    /// `CodeGen`.
    pub fn from_type_tag(type_tag: &str) -> Self {
        match type_tag.to_lowercase().as_str() {
            "feature" | "bug" | "refactor" => AgentKind::CodeGen,
            "deployment" | "deploy" => AgentKind::Deploy,
            "test" | "testing" => AgentKind::Test,
            "docs" | "documentation" => AgentKind::CodeGen,
            _ => AgentKind::CodeGen,
        }
    }

    /// Fixed intra-item ordering used to derive dependencies when multiple
    /// kinds appear in one decomposition: `Issue -> CodeGen -> Review -> PR
    /// -> Deploy`.
    pub fn pipeline_rank(self) -> u8 {
        match self {
            AgentKind::Issue => 0,
            AgentKind::CodeGen => 1,
            AgentKind::Review => 2,
            AgentKind::Pr => 3,
            AgentKind::Deploy => 4,
            AgentKind::Test => 1,
            AgentKind::Coordinator => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_type_falls_back_to_codegen() {
        assert_eq!(AgentKind::from_type_tag("mystery"), AgentKind::CodeGen);
        assert_eq!(AgentKind::from_type_tag("feature"), AgentKind::CodeGen);
        assert_eq!(AgentKind::from_type_tag("deployment"), AgentKind::Deploy);
    }

    #[test]
    fn pipeline_rank_orders_issue_before_pr() {
        assert!(AgentKind::Issue.pipeline_rank() < AgentKind::CodeGen.pipeline_rank());
        assert!(AgentKind::CodeGen.pipeline_rank() < AgentKind::Review.pipeline_rank());
        assert!(AgentKind::Review.pipeline_rank() < AgentKind::Pr.pipeline_rank());
        assert!(AgentKind::Pr.pipeline_rank() < AgentKind::Deploy.pipeline_rank());
    }
}
