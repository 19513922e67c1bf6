use serde::{Deserialize, Serialize};

/// Closed set of known artifact kinds. The filename under
/// `<home>/storage/<owner>-<repo>/issue-<n>/` is `<kind>-output.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    CodegenOutput,
    ReviewOutput,
    PrOutput,
    DeployOutput,
    TestOutput,
}

impl ArtifactKind {
    pub fn file_stem(self) -> &'static str {
        match self {
            ArtifactKind::CodegenOutput => "codegen-output",
            ArtifactKind::ReviewOutput => "review-output",
            ArtifactKind::PrOutput => "pr-output",
            ArtifactKind::DeployOutput => "deploy-output",
            ArtifactKind::TestOutput => "test-output",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Create,
    Modify,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub content: String,
    pub action: FileAction,
}

/// Output of a successful `CodeGen.generate` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegenOutput {
    pub files: Vec<FileChange>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewBreakdown {
    pub eslint: f64,
    pub types: f64,
    pub security: f64,
    pub coverage: f64,
}

/// Output of a successful `Review.review` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutput {
    pub score: u8,
    pub passed: bool,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub breakdown: ReviewBreakdown,
}

impl ReviewOutput {
    pub fn new(score: u8, min_quality_score: u8) -> Self {
        Self {
            score,
            passed: score >= min_quality_score,
            issues: Vec::new(),
            recommendations: Vec::new(),
            breakdown: ReviewBreakdown {
                eslint: 0.0,
                types: 0.0,
                security: 0.0,
                coverage: 0.0,
            },
        }
    }
}

/// Output of a successful `Pr.open` run: the PR the coordinator created
/// (or, on a repeat dispatch, the one it found already open).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrOutput {
    pub number: u64,
    pub url: String,
    pub reused_existing: bool,
}

/// Output of a successful `Deploy.run` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployOutput {
    pub environment: String,
    pub success: bool,
    pub log: String,
}

/// Output of a successful `Test.run` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutput {
    pub passed: bool,
    pub total: u32,
    pub failed: u32,
    pub log: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passed_is_derived_from_the_configured_quality_floor() {
        assert!(ReviewOutput::new(85, 80).passed);
        assert!(!ReviewOutput::new(75, 80).passed);
    }

    #[test]
    fn file_stems_match_the_on_disk_artifact_names() {
        assert_eq!(ArtifactKind::CodegenOutput.file_stem(), "codegen-output");
        assert_eq!(ArtifactKind::ReviewOutput.to_string(), "review-output");
    }
}
