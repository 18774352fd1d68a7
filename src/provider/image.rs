//! Image provider: OpenAI-compatible `/images/generations`.

use crate::error::OverlayError;
use crate::provider::{build_provider_http_client, error_for_status, map_http_error};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request for a single generated image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub n: u32,
    pub size: String,
    pub quality: String,
}

impl ImageRequest {
    pub fn single(model: &str, prompt: String, size: &str, quality: &str) -> Self {
        Self {
            model: model.to_string(),
            prompt,
            n: 1,
            size: size.to_string(),
            quality: quality.to_string(),
        }
    }
}

/// One generated image. Providers return either a short-lived URL or an
/// inline base64 payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageDatum {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub b64_json: Option<String>,
    #[serde(default)]
    pub revised_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageResponse {
    #[serde(default)]
    pub data: Vec<ImageDatum>,
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn issue(&self, request: ImageRequest) -> Result<ImageResponse, OverlayError>;

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}

pub struct OpenAIImageClient {
    client: Client,
    model: String,
    api_key: Option<String>,
    endpoint: String,
}

impl OpenAIImageClient {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, OverlayError> {
        let base_url = base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        Ok(Self {
            client: build_provider_http_client(request_timeout)?,
            model,
            api_key,
            endpoint: format!("{}/images/generations", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ImageProvider for OpenAIImageClient {
    async fn issue(&self, request: ImageRequest) -> Result<ImageResponse, OverlayError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder.send().await.map_err(map_http_error)?;
        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        response.json::<ImageResponse>().await.map_err(|e| {
            OverlayError::ParseError(format!("Failed to parse image response: {}", e))
        })
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
