use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ProviderSettings;

pub mod claude;
pub mod openai;
pub mod openrouter;
pub mod prompts;

pub use claude::ClaudeProvider;
pub use openai::OpenAIProvider;
pub use openrouter::OpenRouterProvider;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_TOKENS: u32 = 2000;

#[derive(Error, Debug)]
pub enum AIError {
    #[error("API request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Empty response from provider")]
    EmptyResponse,
    #[error("Authentication failed")]
    AuthenticationError,
    #[error("Rate limited")]
    RateLimited,
    #[error("Provider not supported: {0}")]
    UnsupportedProvider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// A chat-completion call: the full message sequence plus sampling overrides.
///
/// `None` fields fall back to the provider's configured defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages, temperature: None, max_tokens: None }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Black-box text completion capability
#[async_trait::async_trait]
pub trait AIProvider: Send + Sync {
    /// Send the messages and return the assistant's text.
    ///
    /// Implementations return [`AIError::EmptyResponse`] rather than an empty string.
    async fn complete(&self, request: CompletionRequest) -> Result<String, AIError>;
    fn get_provider_name(&self) -> &str;
    fn get_model(&self) -> &str;
}

/// Connection and sampling settings shared by the HTTP providers
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub base_url: Option<String>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            model: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            base_url: None,
        }
    }
}

impl From<&ProviderSettings> for ProviderOptions {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            model: settings.model.clone(),
            timeout_secs: settings.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
            max_tokens: settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: settings.temperature,
            base_url: settings.base_url.clone(),
        }
    }
}

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, AIError> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Map non-success HTTP statuses onto provider errors
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AIError> {
    debug!("{} response status: {}", provider, response.status());

    if response.status() == 401 {
        error!("{} authentication failed", provider);
        return Err(AIError::AuthenticationError);
    }

    if response.status() == 429 {
        warn!("{} rate limit exceeded", provider);
        return Err(AIError::RateLimited);
    }

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!("{} API error: {} - {}", provider, status, error_text);
        return Err(AIError::InvalidResponse(format!("HTTP {}: {}", status, error_text)));
    }

    Ok(response)
}

pub(crate) fn non_empty(content: Option<String>) -> Result<String, AIError> {
    match content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(AIError::EmptyResponse),
    }
}

pub fn create_provider(provider_name: &str, api_key: &str) -> Result<Box<dyn AIProvider>> {
    create_provider_with_options(provider_name, api_key, ProviderOptions::default())
}

pub fn create_provider_with_options(
    provider_name: &str,
    api_key: &str,
    options: ProviderOptions,
) -> Result<Box<dyn AIProvider>> {
    info!("Creating AI provider: {} with model: {:?}", provider_name, options.model);
    match provider_name.to_lowercase().as_str() {
        "openai" => {
            debug!("Initializing OpenAI provider");
            Ok(Box::new(OpenAIProvider::with_options(api_key.to_string(), options)?))
        }
        "claude" | "anthropic" => {
            debug!("Initializing Claude/Anthropic provider");
            Ok(Box::new(ClaudeProvider::with_options(api_key.to_string(), options)?))
        }
        "openrouter" => {
            debug!("Initializing OpenRouter provider");
            Ok(Box::new(OpenRouterProvider::with_options(api_key.to_string(), options)?))
        }
        _ => {
            error!("Unsupported AI provider: {}", provider_name);
            Err(AIError::UnsupportedProvider(provider_name.to_string()).into())
        }
    }
}
