//! Agent Dispatcher: resolves an `AgentKind` to a callable agent and
//! validates its output against the structured shape the kind expects.

mod agents;

pub use agents::{LlmAgent, PrAgent, artifact_kind_for};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{AgentKind, CodegenOutput, DeployOutput, ExecutionContext, PrOutput, ReviewOutput, TestOutput};
use crate::errors::CoreError;
use crate::llm::LlmClient;

/// Structured output of one agent run. `Generic` covers kinds with no
/// fixed artifact schema (`Issue`).
#[derive(Debug, Clone)]
pub enum AgentOutput {
    Codegen(CodegenOutput),
    Review(ReviewOutput),
    Pr(PrOutput),
    Deploy(DeployOutput),
    Test(TestOutput),
    Generic { message: String },
}

impl AgentOutput {
    pub fn summary(&self) -> String {
        match self {
            AgentOutput::Codegen(out) => out.summary.clone(),
            AgentOutput::Review(out) => format!("score {}", out.score),
            AgentOutput::Pr(out) => format!("pr #{} ({})", out.number, out.url),
            AgentOutput::Deploy(out) => format!("deploy to {}: {}", out.environment, if out.success { "ok" } else { "failed" }),
            AgentOutput::Test(out) => format!("{}/{} tests passed", out.total - out.failed, out.total),
            AgentOutput::Generic { message } => message.clone(),
        }
    }
}

/// A callable capability for one `AgentKind`.
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> AgentKind;
    async fn run(&self, ctx: &ExecutionContext) -> Result<AgentOutput, CoreError>;
}

/// Resolves an `AgentKind` to its `Agent`, the way `llm::create_client`
/// resolves a provider string to a `dyn LlmClient`.
pub struct AgentDispatcher {
    agents: HashMap<AgentKind, Arc<dyn Agent>>,
}

impl AgentDispatcher {
    /// Build the default dispatcher: one `LlmAgent` per LLM-driven kind,
    /// all sharing `llm`. `Pr` has no default entry — it needs an
    /// `ArtifactStore` and a `PlatformGateway` for its precondition and
    /// idempotency checks, so the caller `register`s a `PrAgent` for it.
    pub fn new(llm: Arc<dyn LlmClient>, min_quality_score: u8) -> Self {
        let kinds = [AgentKind::Issue, AgentKind::CodeGen, AgentKind::Review, AgentKind::Deploy, AgentKind::Test];
        let agents = kinds
            .into_iter()
            .map(|kind| {
                let agent: Arc<dyn Agent> = Arc::new(LlmAgent::new(kind, llm.clone(), min_quality_score));
                (kind, agent)
            })
            .collect();
        Self { agents }
    }

    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.kind(), agent);
    }

    pub async fn dispatch(&self, ctx: &ExecutionContext) -> Result<AgentOutput, CoreError> {
        let agent = self
            .agents
            .get(&ctx.task.agent_kind)
            .ok_or_else(|| CoreError::PreconditionMissing(format!("no agent registered for {}", ctx.task.agent_kind)))?;
        agent.run(ctx).await
    }
}
