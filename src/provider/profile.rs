//! Provider profiles: configuration for the reasoning and image providers.

use serde::{Deserialize, Serialize};

/// Reasoning provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    Ollama,
    #[serde(rename = "local")]
    LocalCustom,
}

pub fn provider_type_slug(provider_type: ProviderType) -> &'static str {
    match provider_type {
        ProviderType::OpenAI => "openai",
        ProviderType::Anthropic => "anthropic",
        ProviderType::Ollama => "ollama",
        ProviderType::LocalCustom => "local",
    }
}

impl ProviderType {
    /// Environment variable consulted when no API key is configured.
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("OPENAI_API_KEY"),
            ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderType::Ollama | ProviderType::LocalCustom => None,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderType::OpenAI | ProviderType::Anthropic)
    }
}

fn resolve_key(configured: &Option<String>, env_var: Option<&str>) -> Option<String> {
    configured
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| env_var.and_then(|var| std::env::var(var).ok()))
        .filter(|k| !k.trim().is_empty())
}

/// Reasoning (text) provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningProviderConfig {
    #[serde(default = "default_reasoning_type")]
    pub provider_type: ProviderType,
    #[serde(default = "default_reasoning_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Custom endpoint; required for `local`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_reasoning_type() -> ProviderType {
    ProviderType::OpenAI
}

fn default_reasoning_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_request_timeout_secs() -> u64 {
    45
}

impl Default for ReasoningProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_reasoning_type(),
            model: default_reasoning_model(),
            api_key: None,
            base_url: None,
            max_output_tokens: default_max_output_tokens(),
            temperature: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ReasoningProviderConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(&self.api_key, self.provider_type.api_key_env_var())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if self.max_output_tokens == 0 {
            return Err("max_output_tokens must be positive".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be positive".to_string());
        }
        if self.provider_type == ProviderType::LocalCustom
            && self.base_url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err("base_url is required for local providers".to_string());
        }
        if self.provider_type.requires_api_key() && self.resolved_api_key().is_none() {
            return Err(format!(
                "API key required for {} (set api_key or {})",
                provider_type_slug(self.provider_type),
                self.provider_type.api_key_env_var().unwrap_or("an API key")
            ));
        }
        Ok(())
    }
}

/// Image provider configuration. The image API is OpenAI-compatible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageProviderConfig {
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Fixed canvas size requested for every image, e.g. "1024x1024".
    #[serde(default = "default_image_size")]
    pub size: String,
    #[serde(default = "default_image_quality")]
    pub quality: String,
    #[serde(default = "default_image_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

fn default_image_quality() -> String {
    "high".to_string()
}

fn default_image_timeout_secs() -> u64 {
    50
}

impl Default for ImageProviderConfig {
    fn default() -> Self {
        Self {
            model: default_image_model(),
            api_key: None,
            base_url: None,
            size: default_image_size(),
            quality: default_image_quality(),
            request_timeout_secs: default_image_timeout_secs(),
        }
    }
}

impl ImageProviderConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(&self.api_key, Some("OPENAI_API_KEY"))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if crate::types::CanvasSize::parse(&self.size).is_none() {
            return Err(format!(
                "Invalid image size '{}' (expected WIDTHxHEIGHT)",
                self.size
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be positive".to_string());
        }
        if self.base_url.is_none() && self.resolved_api_key().is_none() {
            return Err("API key required for the image provider (set api_key or OPENAI_API_KEY)"
                .to_string());
        }
        Ok(())
    }
}
