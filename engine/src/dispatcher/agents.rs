use std::sync::Arc;

use async_trait::async_trait;
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};

use crate::artifact_store::ArtifactStore;
use crate::domain::{
    AgentKind, ArtifactKind, CodegenOutput, DeployOutput, ExecutionContext, FileAction, FileChange, PrOutput,
    ReviewBreakdown, ReviewOutput, TestOutput,
};
use crate::errors::CoreError;
use crate::llm::{CompletionRequest, LlmClient, Message, ToolDefinition};
use crate::platform::{PlatformGateway, PullRequestDraft};

use super::{Agent, AgentOutput};

const SYSTEM_PROMPT_TEMPLATE: &str = "You are the {{agent_kind}} agent for {{owner}}/{{repo}}#{{issue_number}}.\n\n{{task_description}}";

fn render_system_prompt(ctx: &ExecutionContext) -> String {
    let hb = Handlebars::new();
    hb.render_template(
        SYSTEM_PROMPT_TEMPLATE,
        &serde_json::json!({
            "agent_kind": ctx.task.agent_kind.to_string(),
            "owner": ctx.work_item.owner,
            "repo": ctx.work_item.repo,
            "issue_number": ctx.work_item.number,
            "task_description": ctx.task.description,
        }),
    )
    .unwrap_or_else(|_| ctx.rendered_prompt.clone())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CodegenToolInput {
    files: Vec<ToolFileChange>,
    summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolFileChange {
    path: String,
    content: String,
    action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReviewToolInput {
    score: u8,
    issues: Vec<String>,
    recommendations: Vec<String>,
    breakdown: ReviewBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeployToolInput {
    environment: String,
    success: bool,
    log: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TestToolInput {
    passed: bool,
    total: u32,
    failed: u32,
    log: String,
}

/// One agent per `AgentKind`, all sharing the same LLM-completion shape
/// but parsing the tool call into a different structured output.
pub struct LlmAgent {
    kind: AgentKind,
    llm: Arc<dyn LlmClient>,
    min_quality_score: u8,
}

impl LlmAgent {
    pub fn new(kind: AgentKind, llm: Arc<dyn LlmClient>, min_quality_score: u8) -> Self {
        Self { kind, llm, min_quality_score }
    }

    fn tool_definition(&self) -> Option<ToolDefinition> {
        match self.kind {
            AgentKind::CodeGen => Some(ToolDefinition::new(
                "submit_codegen",
                "Submit the code changes for this task.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "files": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "path": {"type": "string"},
                                    "content": {"type": "string"},
                                    "action": {"type": "string", "enum": ["create", "modify", "delete"]}
                                },
                                "required": ["path", "content", "action"]
                            }
                        },
                        "summary": {"type": "string"}
                    },
                    "required": ["files", "summary"]
                }),
            )),
            AgentKind::Review => Some(ToolDefinition::new(
                "submit_review",
                "Submit the review result for this task's diff.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "score": {"type": "integer", "minimum": 0, "maximum": 100},
                        "issues": {"type": "array", "items": {"type": "string"}},
                        "recommendations": {"type": "array", "items": {"type": "string"}},
                        "breakdown": {
                            "type": "object",
                            "properties": {
                                "eslint": {"type": "number"},
                                "types": {"type": "number"},
                                "security": {"type": "number"},
                                "coverage": {"type": "number"}
                            },
                            "required": ["eslint", "types", "security", "coverage"]
                        }
                    },
                    "required": ["score", "issues", "recommendations", "breakdown"]
                }),
            )),
            AgentKind::Deploy => Some(ToolDefinition::new(
                "submit_deploy",
                "Report the result of deploying this task's changes.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "environment": {"type": "string"},
                        "success": {"type": "boolean"},
                        "log": {"type": "string"}
                    },
                    "required": ["environment", "success", "log"]
                }),
            )),
            AgentKind::Test => Some(ToolDefinition::new(
                "submit_test_run",
                "Report the result of running this task's test suite.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "passed": {"type": "boolean"},
                        "total": {"type": "integer", "minimum": 0},
                        "failed": {"type": "integer", "minimum": 0},
                        "log": {"type": "string"}
                    },
                    "required": ["passed", "total", "failed", "log"]
                }),
            )),
            _ => None,
        }
    }

    fn parse_codegen(&self, input: &serde_json::Value) -> Result<CodegenOutput, CoreError> {
        let parsed: CodegenToolInput = serde_json::from_value(input.clone())
            .map_err(|e| CoreError::AgentExecutionFailed(format!("malformed codegen output: {e}")))?;
        let files = parsed
            .files
            .into_iter()
            .map(|f| FileChange {
                path: f.path,
                content: f.content,
                action: match f.action.as_str() {
                    "create" => FileAction::Create,
                    "delete" => FileAction::Delete,
                    _ => FileAction::Modify,
                },
            })
            .collect();
        Ok(CodegenOutput { files, summary: parsed.summary })
    }

    fn parse_review(&self, input: &serde_json::Value) -> Result<ReviewOutput, CoreError> {
        let parsed: ReviewToolInput = serde_json::from_value(input.clone())
            .map_err(|e| CoreError::AgentExecutionFailed(format!("malformed review output: {e}")))?;
        Ok(ReviewOutput {
            score: parsed.score,
            passed: parsed.score >= self.min_quality_score,
            issues: parsed.issues,
            recommendations: parsed.recommendations,
            breakdown: parsed.breakdown,
        })
    }

    fn parse_deploy(&self, input: &serde_json::Value) -> Result<DeployOutput, CoreError> {
        let parsed: DeployToolInput = serde_json::from_value(input.clone())
            .map_err(|e| CoreError::AgentExecutionFailed(format!("malformed deploy output: {e}")))?;
        Ok(DeployOutput { environment: parsed.environment, success: parsed.success, log: parsed.log })
    }

    fn parse_test(&self, input: &serde_json::Value) -> Result<TestOutput, CoreError> {
        let parsed: TestToolInput = serde_json::from_value(input.clone())
            .map_err(|e| CoreError::AgentExecutionFailed(format!("malformed test output: {e}")))?;
        Ok(TestOutput { passed: parsed.passed, total: parsed.total, failed: parsed.failed, log: parsed.log })
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn run(&self, ctx: &ExecutionContext) -> Result<AgentOutput, CoreError> {
        let system_prompt = render_system_prompt(ctx);
        let mut tools = Vec::new();
        if let Some(tool) = self.tool_definition() {
            tools.push(tool);
        }

        let request = CompletionRequest {
            system_prompt,
            messages: vec![Message::user(ctx.rendered_prompt.clone())],
            tools,
            max_tokens: 8192,
        };

        let response = self.llm.complete(request).await?;

        let tool_call = response.tool_calls.first();
        match (self.kind, tool_call) {
            (AgentKind::CodeGen, Some(call)) => Ok(AgentOutput::Codegen(self.parse_codegen(&call.input)?)),
            (AgentKind::Review, Some(call)) => Ok(AgentOutput::Review(self.parse_review(&call.input)?)),
            (AgentKind::Deploy, Some(call)) => Ok(AgentOutput::Deploy(self.parse_deploy(&call.input)?)),
            (AgentKind::Test, Some(call)) => Ok(AgentOutput::Test(self.parse_test(&call.input)?)),
            _ => Ok(AgentOutput::Generic { message: response.content.unwrap_or_default() }),
        }
    }
}

pub fn artifact_kind_for(agent_kind: AgentKind) -> Option<ArtifactKind> {
    match agent_kind {
        AgentKind::CodeGen => Some(ArtifactKind::CodegenOutput),
        AgentKind::Review => Some(ArtifactKind::ReviewOutput),
        AgentKind::Pr => Some(ArtifactKind::PrOutput),
        AgentKind::Deploy => Some(ArtifactKind::DeployOutput),
        AgentKind::Test => Some(ArtifactKind::TestOutput),
        _ => None,
    }
}

/// The `Pr` agent: not LLM-driven. It enforces spec.md's precondition
/// (`CodegenOutput` and a passing `ReviewOutput` must already be on
/// disk for this item) and idempotency (a PR already opened for this
/// item is returned rather than duplicated) before calling out to the
/// platform.
pub struct PrAgent {
    artifacts: Arc<ArtifactStore>,
    platform: Arc<dyn PlatformGateway>,
    base_branch: String,
}

impl PrAgent {
    pub fn new(artifacts: Arc<ArtifactStore>, platform: Arc<dyn PlatformGateway>, base_branch: impl Into<String>) -> Self {
        Self { artifacts, platform, base_branch: base_branch.into() }
    }

    fn branch_name(&self, ctx: &ExecutionContext) -> String {
        format!("agent/issue-{}", ctx.work_item.number)
    }
}

#[async_trait]
impl Agent for PrAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Pr
    }

    async fn run(&self, ctx: &ExecutionContext) -> Result<AgentOutput, CoreError> {
        let owner = &ctx.work_item.owner;
        let repo = &ctx.work_item.repo;
        let number = ctx.work_item.number;

        if !self.artifacts.has(owner, repo, number, ArtifactKind::CodegenOutput) {
            return Err(CoreError::PreconditionMissing(format!("no codegen output for {owner}/{repo}#{number}")));
        }
        let review: ReviewOutput = self
            .artifacts
            .read(owner, repo, number, ArtifactKind::ReviewOutput)
            .map_err(|e| CoreError::Internal(e.to_string()))?
            .ok_or_else(|| CoreError::PreconditionMissing(format!("no review output for {owner}/{repo}#{number}")))?;
        if !review.passed {
            return Err(CoreError::PreconditionMissing(format!(
                "review did not pass for {owner}/{repo}#{number} (score {})",
                review.score
            )));
        }

        if let Some(existing) = self
            .artifacts
            .read::<PrOutput>(owner, repo, number, ArtifactKind::PrOutput)
            .map_err(|e| CoreError::Internal(e.to_string()))?
        {
            return Ok(AgentOutput::Pr(PrOutput { reused_existing: true, ..existing }));
        }

        let draft = PullRequestDraft {
            title: format!("{}: {}", ctx.task.agent_kind, ctx.work_item.title),
            body: ctx.rendered_prompt.clone(),
            head_branch: self.branch_name(ctx),
            base_branch: self.base_branch.clone(),
        };
        let pr = self.platform.create_pull_request(owner, repo, draft).await.map_err(|e| CoreError::Network(e.to_string()))?;
        Ok(AgentOutput::Pr(PrOutput { number: pr.number, url: pr.url, reused_existing: false }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, WorkItem};

    fn ctx() -> ExecutionContext {
        let task = Task::new("Add widget", "feature", AgentKind::CodeGen);
        let work_item = WorkItem {
            owner: "acme".into(),
            repo: "widgets".into(),
            number: 7,
            title: "Add widget".into(),
            body: String::new(),
            open: true,
            labels: Vec::new(),
            assignee: None,
            created_at: 0,
            updated_at: 0,
            url: "https://example.test/7".into(),
        };
        ExecutionContext::new(task, work_item, "Implement the widget.".into())
    }

    #[test]
    fn system_prompt_interpolates_agent_kind_and_issue_reference() {
        let rendered = render_system_prompt(&ctx());
        assert!(rendered.contains("CodeGen"));
        assert!(rendered.contains("acme"));
        assert!(rendered.contains("7"));
    }

    #[test]
    fn artifact_kind_maps_only_structured_agents() {
        assert_eq!(artifact_kind_for(AgentKind::CodeGen), Some(ArtifactKind::CodegenOutput));
        assert_eq!(artifact_kind_for(AgentKind::Pr), Some(ArtifactKind::PrOutput));
    }

    struct StubGateway {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl StubGateway {
        fn new() -> Self {
            Self { calls: std::sync::atomic::AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl PlatformGateway for StubGateway {
        async fn get_work_item(&self, _owner: &str, _repo: &str, _number: u64) -> Result<crate::domain::WorkItem, crate::platform::GatewayError> {
            unimplemented!()
        }

        async fn list_work_items(&self, _owner: &str, _repo: &str, _page: u32) -> Result<crate::platform::WorkItemPage, crate::platform::GatewayError> {
            unimplemented!()
        }

        async fn patch_labels(
            &self,
            _owner: &str,
            _repo: &str,
            _number: u64,
            _patch: crate::platform::LabelPatch,
        ) -> Result<(), crate::platform::GatewayError> {
            unimplemented!()
        }

        async fn post_comment(&self, _owner: &str, _repo: &str, _number: u64, _comment: crate::platform::Comment) -> Result<(), crate::platform::GatewayError> {
            unimplemented!()
        }

        async fn create_issue(&self, _owner: &str, _repo: &str, _draft: crate::platform::IssueDraft) -> Result<crate::domain::WorkItem, crate::platform::GatewayError> {
            unimplemented!()
        }

        async fn list_pull_requests(&self, _owner: &str, _repo: &str, _page: u32) -> Result<crate::platform::PullRequestPage, crate::platform::GatewayError> {
            unimplemented!()
        }

        async fn list_pr_files(&self, _owner: &str, _repo: &str, _number: u64) -> Result<Vec<String>, crate::platform::GatewayError> {
            unimplemented!()
        }

        async fn create_milestone(&self, _owner: &str, _repo: &str, _title: &str) -> Result<crate::platform::Milestone, crate::platform::GatewayError> {
            unimplemented!()
        }

        async fn create_pull_request(
            &self,
            _owner: &str,
            _repo: &str,
            draft: crate::platform::PullRequestDraft,
        ) -> Result<crate::platform::PullRequest, crate::platform::GatewayError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(crate::platform::PullRequest { number: 101, url: format!("https://example.test/pulls/101/{}", draft.head_branch) })
        }

        async fn rate_limit_status(&self) -> Result<crate::platform::RateLimitStatus, crate::platform::GatewayError> {
            unimplemented!()
        }
    }

    fn pr_agent(artifacts: Arc<ArtifactStore>, gateway: Arc<StubGateway>) -> PrAgent {
        PrAgent::new(artifacts, gateway, "main")
    }

    #[tokio::test]
    async fn pr_agent_fails_precondition_without_codegen_output() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(dir.path()));
        let gateway = Arc::new(StubGateway::new());
        let agent = pr_agent(artifacts, gateway.clone());

        let err = agent.run(&ctx()).await.unwrap_err();
        assert!(matches!(err, CoreError::PreconditionMissing(_)));
        assert_eq!(gateway.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pr_agent_fails_precondition_when_review_has_not_passed() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(dir.path()));
        artifacts
            .write("acme", "widgets", 7, ArtifactKind::CodegenOutput, &CodegenOutput { files: vec![], summary: "noop".into() })
            .unwrap();
        artifacts.write("acme", "widgets", 7, ArtifactKind::ReviewOutput, &ReviewOutput::new(40, 80)).unwrap();
        let gateway = Arc::new(StubGateway::new());
        let agent = pr_agent(artifacts, gateway.clone());

        let err = agent.run(&ctx()).await.unwrap_err();
        assert!(matches!(err, CoreError::PreconditionMissing(_)));
        assert_eq!(gateway.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pr_agent_opens_a_pull_request_once_preconditions_hold() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(dir.path()));
        artifacts
            .write("acme", "widgets", 7, ArtifactKind::CodegenOutput, &CodegenOutput { files: vec![], summary: "noop".into() })
            .unwrap();
        artifacts.write("acme", "widgets", 7, ArtifactKind::ReviewOutput, &ReviewOutput::new(90, 80)).unwrap();
        let gateway = Arc::new(StubGateway::new());
        let agent = pr_agent(artifacts, gateway.clone());

        let out = agent.run(&ctx()).await.unwrap();
        match out {
            AgentOutput::Pr(pr) => {
                assert_eq!(pr.number, 101);
                assert!(!pr.reused_existing);
            }
            other => panic!("expected AgentOutput::Pr, got {other:?}"),
        }
        assert_eq!(gateway.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pr_agent_reuses_an_already_opened_pull_request() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(dir.path()));
        artifacts
            .write("acme", "widgets", 7, ArtifactKind::CodegenOutput, &CodegenOutput { files: vec![], summary: "noop".into() })
            .unwrap();
        artifacts.write("acme", "widgets", 7, ArtifactKind::ReviewOutput, &ReviewOutput::new(90, 80)).unwrap();
        artifacts
            .write("acme", "widgets", 7, ArtifactKind::PrOutput, &PrOutput { number: 55, url: "https://example.test/pulls/55".into(), reused_existing: false })
            .unwrap();
        let gateway = Arc::new(StubGateway::new());
        let agent = pr_agent(artifacts, gateway.clone());

        let out = agent.run(&ctx()).await.unwrap();
        match out {
            AgentOutput::Pr(pr) => {
                assert_eq!(pr.number, 55);
                assert!(pr.reused_existing);
            }
            other => panic!("expected AgentOutput::Pr, got {other:?}"),
        }
        assert_eq!(gateway.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
