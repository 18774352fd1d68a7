//! Model Provider Abstraction
//!
//! Constructor-injected interfaces for the two external generative providers:
//! a reasoning (text) model that returns free-form text wrapping one JSON
//! object, and an image model that returns short-lived image URLs. Concrete
//! clients speak the OpenAI-compatible and Anthropic HTTP APIs.

use crate::error::OverlayError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub mod image;
pub mod profile;

pub use image::{ImageDatum, ImageProvider, ImageRequest, ImageResponse, OpenAIImageClient};
pub use profile::{ImageProviderConfig, ProviderType, ReasoningProviderConfig};

/// Request to the reasoning provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub max_output_tokens: u32,
    pub temperature: Option<f32>,
}

impl ReasoningRequest {
    pub fn new(prompt: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_output_tokens,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Free-form text returned by the reasoning provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningResponse {
    pub text: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// Reasoning provider client trait
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Issue one completion request.
    async fn issue(&self, request: ReasoningRequest) -> Result<ReasoningResponse, OverlayError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Get the model name
    fn model_name(&self) -> &str;
}

// OpenAI-compatible API request/response structures
#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Map transport-level failures to `ProviderError` with no status.
pub(crate) fn map_http_error(error: reqwest::Error) -> OverlayError {
    if let Some(status) = error.status() {
        OverlayError::provider(Some(status.as_u16()), error.to_string())
    } else if error.is_timeout() {
        OverlayError::provider(None, format!("Request timeout: {}", error))
    } else if error.is_connect() {
        OverlayError::provider(None, format!("Connection error: {}", error))
    } else {
        OverlayError::provider(None, format!("HTTP error: {}", error))
    }
}

/// Turn a non-2xx response into `ProviderError` carrying status and body.
pub(crate) async fn error_for_status(response: reqwest::Response) -> OverlayError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    OverlayError::provider(Some(status), body)
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_provider_http_client(request_timeout: Duration) -> Result<Client, OverlayError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
        .map_err(|e| OverlayError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Client for OpenAI-compatible chat completion endpoints
/// (OpenAI, Ollama, custom local servers).
pub struct ChatCompletionsClient {
    client: Client,
    provider_name: String,
    model: String,
    api_key: Option<String>,
    endpoint: String,
}

impl ChatCompletionsClient {
    pub fn openai(
        model: String,
        api_key: String,
        base_url: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, OverlayError> {
        let base_url = base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        Self::build("openai", model, Some(api_key), chat_endpoint(&base_url), request_timeout)
    }

    pub fn ollama(
        model: String,
        base_url: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, OverlayError> {
        let base_url = base_url.unwrap_or_else(|| "http://localhost:11434".to_string());
        let endpoint = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
        Self::build("ollama", model, None, endpoint, request_timeout)
    }

    pub fn local(
        model: String,
        base_url: String,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, OverlayError> {
        let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url
        } else {
            format!("http://{}", base_url)
        };
        Self::build("local", model, api_key, chat_endpoint(&base_url), request_timeout)
    }

    fn build(
        provider_name: &str,
        model: String,
        api_key: Option<String>,
        endpoint: String,
        request_timeout: Duration,
    ) -> Result<Self, OverlayError> {
        Ok(Self {
            client: build_provider_http_client(request_timeout)?,
            provider_name: provider_name.to_string(),
            model,
            api_key,
            endpoint,
        })
    }
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

#[async_trait]
impl ReasoningProvider for ChatCompletionsClient {
    async fn issue(&self, request: ReasoningRequest) -> Result<ReasoningResponse, OverlayError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: request.prompt,
        });

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
            stream: false,
        };

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder.send().await.map_err(map_http_error)?;
        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            OverlayError::ParseError(format!("Failed to parse completion response: {}", e))
        })?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| {
            OverlayError::ParseError("No choices in completion response".to_string())
        })?;

        let usage = completion
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(ReasoningResponse {
            text: choice.message.content,
            model: completion.model.unwrap_or_else(|| self.model.clone()),
            usage,
        })
    }

    fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Anthropic messages API client
pub struct AnthropicClient {
    client: Client,
    model: String,
    api_key: String,
    endpoint: String,
}

impl AnthropicClient {
    pub fn new(
        model: String,
        api_key: String,
        base_url: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, OverlayError> {
        let base_url = base_url.unwrap_or_else(|| "https://api.anthropic.com/v1".to_string());
        Ok(Self {
            client: build_provider_http_client(request_timeout)?,
            model,
            api_key,
            endpoint: format!("{}/messages", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ReasoningProvider for AnthropicClient {
    async fn issue(&self, request: ReasoningRequest) -> Result<ReasoningResponse, OverlayError> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_output_tokens,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        if let Some(system) = request.system {
            body["system"] = json!(system);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
            model: String,
            usage: Option<AnthropicUsage>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            #[serde(default)]
            text: Option<String>,
        }

        #[derive(Deserialize)]
        struct AnthropicUsage {
            input_tokens: u32,
            output_tokens: u32,
        }

        let completion: AnthropicResponse = response.json().await.map_err(|e| {
            OverlayError::ParseError(format!("Failed to parse messages response: {}", e))
        })?;

        let text = completion
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = completion
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            })
            .unwrap_or_default();

        Ok(ReasoningResponse {
            text,
            model: completion.model,
            usage,
        })
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Builds provider clients from configuration.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_reasoning_client(
        config: &ReasoningProviderConfig,
    ) -> Result<Arc<dyn ReasoningProvider>, OverlayError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let missing_key = || {
            OverlayError::ConfigError(format!(
                "API key required for {} reasoning provider",
                profile::provider_type_slug(config.provider_type)
            ))
        };
        let client: Arc<dyn ReasoningProvider> = match config.provider_type {
            ProviderType::OpenAI => Arc::new(ChatCompletionsClient::openai(
                config.model.clone(),
                config.resolved_api_key().ok_or_else(missing_key)?,
                config.base_url.clone(),
                timeout,
            )?),
            ProviderType::Anthropic => Arc::new(AnthropicClient::new(
                config.model.clone(),
                config.resolved_api_key().ok_or_else(missing_key)?,
                config.base_url.clone(),
                timeout,
            )?),
            ProviderType::Ollama => Arc::new(ChatCompletionsClient::ollama(
                config.model.clone(),
                config.base_url.clone(),
                timeout,
            )?),
            ProviderType::LocalCustom => {
                let base_url = config.base_url.clone().ok_or_else(|| {
                    OverlayError::ConfigError("base_url is required for local providers".to_string())
                })?;
                Arc::new(ChatCompletionsClient::local(
                    config.model.clone(),
                    base_url,
                    config.resolved_api_key(),
                    timeout,
                )?)
            }
        };
        Ok(client)
    }

    pub fn create_image_client(
        config: &ImageProviderConfig,
    ) -> Result<Arc<dyn ImageProvider>, OverlayError> {
        Ok(Arc::new(OpenAIImageClient::new(
            config.model.clone(),
            config.resolved_api_key(),
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?))
    }
}
