//! Error types for the overlay pack generation pipeline.

use std::time::Duration;
use thiserror::Error;

/// Storage-related errors raised by the durable pack store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("Failed to encode pack: {0}")]
    Encode(String),

    #[error("Failed to decode pack: {0}")]
    Decode(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Pipeline errors.
///
/// Cloneable so that a single leader result can be fanned out to every
/// caller waiting on the same cache key.
#[derive(Debug, Clone, Error)]
pub enum OverlayError {
    #[error("Provider error (status {}): {body}", status_label(.status))]
    ProviderError { status: Option<u16>, body: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Generation error: {0}")]
    GenerationError(String),

    #[error("Generation for {key} exceeded deadline of {}ms", .deadline.as_millis())]
    LockTimeoutError { key: String, deadline: Duration },

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "transport".to_string(),
    }
}

const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "quota exceeded",
];

impl OverlayError {
    pub fn provider(status: Option<u16>, body: impl Into<String>) -> Self {
        OverlayError::ProviderError {
            status,
            body: body.into(),
        }
    }

    /// True when the error carries a recognizable rate-limit signal:
    /// an explicit 429 status or a rate-limit phrase in the message.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            OverlayError::ProviderError { status: Some(429), .. } => true,
            OverlayError::ProviderError { body, .. } => {
                let lowered = body.to_lowercase();
                RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m))
            }
            _ => false,
        }
    }

    /// Short stable name for logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            OverlayError::ProviderError { .. } => "provider",
            OverlayError::ParseError(_) => "parse",
            OverlayError::ValidationError(_) => "validation",
            OverlayError::GenerationError(_) => "generation",
            OverlayError::LockTimeoutError { .. } => "lock_timeout",
            OverlayError::CacheError(_) => "cache",
            OverlayError::ConfigError(_) => "config",
        }
    }
}

impl From<StorageError> for OverlayError {
    fn from(err: StorageError) -> Self {
        OverlayError::CacheError(err.to_string())
    }
}

impl From<config::ConfigError> for OverlayError {
    fn from(err: config::ConfigError) -> Self {
        OverlayError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for OverlayError {
    fn from(err: serde_json::Error) -> Self {
        OverlayError::ParseError(err.to_string())
    }
}
