use async_trait::async_trait;

use crate::{Completion, CompletionRequest};

/// The model-call collaborator: given message turns and stop sequences,
/// produce text.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for status display.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and wait for the full response.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Completion>;
}
