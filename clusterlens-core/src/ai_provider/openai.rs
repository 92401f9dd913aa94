use crate::ai_provider::{
    build_client, check_status, non_empty, AIError, AIProvider, ChatMessage, CompletionRequest,
    ProviderOptions,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4";

/// Wire format shared by OpenAI-compatible chat completion APIs
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionBody<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionMessage {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    pub fn into_content(self) -> Result<String, AIError> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            AIError::InvalidResponse("No choices in response".to_string())
        })?;
        non_empty(choice.message.content)
    }
}

pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl OpenAIProvider {
    pub fn new(api_key: String) -> Result<Self, AIError> {
        Self::with_options(api_key, ProviderOptions::default())
    }

    pub fn with_options(api_key: String, options: ProviderOptions) -> Result<Self, AIError> {
        Ok(Self {
            client: build_client(options.timeout_secs)?,
            api_key,
            model: options.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: options.base_url.unwrap_or_else(|| OPENAI_API_URL.to_string()),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        })
    }
}

#[async_trait::async_trait]
impl AIProvider for OpenAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AIError> {
        info!("Sending OpenAI completion with model: {}", self.model);
        debug!("Request carries {} messages", request.messages.len());

        let body = ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature.or(self.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send OpenAI request: {}", e);
                AIError::RequestError(e)
            })?;

        let response = check_status("OpenAI", response).await?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AIError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        completion.into_content()
    }

    fn get_provider_name(&self) -> &str {
        "openai"
    }

    fn get_model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_provider_creation() {
        let provider = OpenAIProvider::new("test_key".to_string()).unwrap();
        assert_eq!(provider.api_key, "test_key");
        assert_eq!(provider.model, "gpt-4");
        assert_eq!(provider.base_url, OPENAI_API_URL);
    }

    #[test]
    fn test_openai_provider_model_override() {
        let options = ProviderOptions { model: Some("gpt-4o-mini".to_string()), ..Default::default() };
        let provider = OpenAIProvider::with_options("test_key".to_string(), options).unwrap();
        assert_eq!(provider.model, "gpt-4o-mini");
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::system("persona"), ChatMessage::user("question")];
        let body = ChatCompletionBody {
            model: "gpt-4",
            messages: &messages,
            temperature: Some(0.4),
            max_tokens: 2000,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "question");
        assert_eq!(json["max_tokens"], 2000);
    }

    #[test]
    fn test_temperature_omitted_when_unset() {
        let body = ChatCompletionBody {
            model: "gpt-4",
            messages: &[],
            temperature: None,
            max_tokens: 10,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_response_content_extraction() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"<h1>Findings</h1>"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_content().unwrap(), "<h1>Findings</h1>");
    }

    #[test]
    fn test_response_without_usable_content() {
        let no_choices: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(no_choices.into_content(), Err(AIError::InvalidResponse(_))));

        let null_content: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(matches!(null_content.into_content(), Err(AIError::EmptyResponse)));
    }
}
