//! OpenAI-compatible chat completions client. Works against hosted OpenAI and
//! local servers that expose the same `/chat/completions` route (Ollama, vLLM).

use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{AdvisoryClient, Completion, CompletionRequest, Provider};
use anyhow::Context;
use serde::{Deserialize, Serialize};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 2000;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings.require_openai_base_url()?.to_string();
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let temperature = std::env::var("OPENAI_TEMPERATURE")
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .unwrap_or(DEFAULT_TEMPERATURE);
        let max_tokens = std::env::var("OPENAI_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let http = reqwest::Client::builder()
            .timeout(settings.advisor_timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key: settings.openai_api_key.clone(),
            base_url,
            model,
            temperature,
            max_tokens,
        })
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: request.user.clone(),
                },
            ],
        }
    }

    fn into_completion(res: ChatResponse) -> anyhow::Result<Completion> {
        let text = res
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        anyhow::ensure!(
            !text.trim().is_empty(),
            LlmDiagnosticsError {
                provider: Provider::OpenAI,
                stage: "empty",
                detail: "no message content in first choice".to_string(),
                raw_output: None,
            }
        );
        Ok(Completion::Text(text))
    }
}

#[async_trait::async_trait]
impl AdvisoryClient for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<Completion> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut builder = self.http.post(url).json(&self.build_request(&request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let res = builder.send().await.context("chat completions request failed")?;
        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read chat completions response body")?;
        if !status.is_success() {
            return Err(LlmDiagnosticsError {
                provider: Provider::OpenAI,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
            }
            .into());
        }

        let parsed = serde_json::from_str::<ChatResponse>(&text)
            .with_context(|| format!("failed to decode chat completions response: {text}"))?;
        Self::into_completion(parsed)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
