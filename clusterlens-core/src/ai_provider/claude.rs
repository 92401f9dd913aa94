use crate::ai_provider::{
    build_client, check_status, non_empty, AIError, AIProvider, ChatMessage, ChatRole,
    CompletionRequest, ProviderOptions,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

#[derive(Debug, Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: Option<String>,
}

pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl ClaudeProvider {
    pub fn new(api_key: String) -> Result<Self, AIError> {
        Self::with_options(api_key, ProviderOptions::default())
    }

    pub fn with_options(api_key: String, options: ProviderOptions) -> Result<Self, AIError> {
        Ok(Self {
            client: build_client(options.timeout_secs)?,
            api_key,
            model: options.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: options.base_url.unwrap_or_else(|| ANTHROPIC_API_URL.to_string()),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        })
    }
}

/// The Messages API takes system text out-of-band; every other turn stays in order.
fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<ClaudeMessage<'_>>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == ChatRole::System)
        .map(|m| m.content.as_str())
        .collect();

    let turns = messages
        .iter()
        .filter(|m| m.role != ChatRole::System)
        .map(|m| ClaudeMessage { role: m.role.as_str(), content: &m.content })
        .collect();

    let system = if system.is_empty() { None } else { Some(system.join("\n\n")) };
    (system, turns)
}

#[async_trait::async_trait]
impl AIProvider for ClaudeProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AIError> {
        info!("Sending Claude completion with model: {}", self.model);

        let (system, messages) = split_system(&request.messages);
        let claude_request = ClaudeRequest {
            model: &self.model,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature.or(self.temperature),
            system,
            messages,
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&claude_request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send Claude request: {}", e);
                AIError::RequestError(e)
            })?;

        let response = check_status("Claude", response).await?;

        let claude_response: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| AIError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        if claude_response.content.is_empty() {
            return Err(AIError::InvalidResponse("No content in response".to_string()));
        }

        let text: String = claude_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();

        non_empty(Some(text))
    }

    fn get_provider_name(&self) -> &str {
        "claude"
    }

    fn get_model(&self) -> &str {
        &self.model
    }
}
