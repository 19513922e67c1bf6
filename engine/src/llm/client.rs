use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Capability to turn a `CompletionRequest` into a `CompletionResponse`,
/// implemented once per provider. The agent dispatcher resolves an
/// `AgentKind` to a `dyn Agent` the same way this trait's object resolves
/// a provider string to a concrete client.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
