pub mod anthropic;
pub mod error;
pub mod json;
pub mod openai;
pub mod prompt;

use crate::config::{AdvisorProvider, Settings};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

/// Structured-output hint. Providers that support tool calling force the
/// model to answer through this schema; others rely on the prompt alone.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub tool: Option<ToolSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Already-decoded structured output (tool input).
    Structured(serde_json::Value),
    /// Free text, possibly containing JSON.
    Text(String),
}

#[async_trait::async_trait]
pub trait AdvisoryClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<Completion>;
}

/// Builds the configured client, or `None` when the advisor is disabled.
pub fn client_from_settings(settings: &Settings) -> anyhow::Result<Option<Arc<dyn AdvisoryClient>>> {
    let client: Arc<dyn AdvisoryClient> = match settings.advisor_provider {
        AdvisorProvider::Anthropic => Arc::new(anthropic::AnthropicClient::from_settings(settings)?),
        AdvisorProvider::OpenAi => Arc::new(openai::OpenAiClient::from_settings(settings)?),
        AdvisorProvider::Disabled => return Ok(None),
    };
    tracing::info!(provider = ?client.provider(), "advisory client configured");
    Ok(Some(client))
}
