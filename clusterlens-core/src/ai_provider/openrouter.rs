use crate::ai_provider::openai::{ChatCompletionBody, ChatCompletionResponse};
use crate::ai_provider::{
    build_client, check_status, AIError, AIProvider, CompletionRequest, ProviderOptions,
};
use reqwest::Client;
use tracing::{debug, error, info};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl OpenRouterProvider {
    pub fn new(api_key: String) -> Result<Self, AIError> {
        Self::with_options(api_key, ProviderOptions::default())
    }

    pub fn with_options(api_key: String, options: ProviderOptions) -> Result<Self, AIError> {
        Ok(Self {
            client: build_client(options.timeout_secs)?,
            api_key,
            model: options.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: options.base_url.unwrap_or_else(|| OPENROUTER_API_URL.to_string()),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        })
    }
}

#[async_trait::async_trait]
impl AIProvider for OpenRouterProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AIError> {
        info!("Sending OpenRouter completion with model: {}", self.model);

        let body = ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature.or(self.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
        };

        debug!("Sending OpenRouter request");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", "ClusterLens")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send OpenRouter request: {}", e);
                AIError::RequestError(e)
            })?;

        let response = check_status("OpenRouter", response).await?;

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse OpenRouter response: {}", e);
            AIError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        completion.into_content()
    }

    fn get_provider_name(&self) -> &str {
        "openrouter"
    }

    fn get_model(&self) -> &str {
        &self.model
    }
}
