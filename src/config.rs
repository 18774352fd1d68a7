//! Configuration System
//!
//! Layered configuration: built-in defaults, the global config file, the
//! workspace config files, then `OVERLAY__`-prefixed environment variables.
//! Every problem is reported at once by [`OverlayConfig::validate`].

use crate::error::OverlayError;
use crate::logging::LoggingConfig;
use crate::orchestrator::OrchestratorOptions;
use crate::provider::{ImageProviderConfig, ReasoningProviderConfig};
use crate::retry::RetryConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;
pub use sources::workspace_file::workspace_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayConfig {
    #[serde(default)]
    pub reasoning: ReasoningProviderConfig,

    #[serde(default)]
    pub image: ImageProviderConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where packs and re-hosted images live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for both stores. Defaults to the platform data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Sled database path; defaults to `<data_dir>/packs`.
    #[serde(default)]
    pub pack_db: Option<PathBuf>,

    /// Re-hosted image directory; defaults to `<data_dir>/images`.
    #[serde(default)]
    pub image_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn data_root(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            ProjectDirs::from("", "", sources::global_file::APP_DIR)
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".overlay-forge"))
        })
    }

    pub fn pack_db_path(&self) -> PathBuf {
        self.pack_db
            .clone()
            .unwrap_or_else(|| self.data_root().join("packs"))
    }

    pub fn image_dir_path(&self) -> PathBuf {
        self.image_dir
            .clone()
            .unwrap_or_else(|| self.data_root().join("images"))
    }
}

/// Pipeline behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Overall deadline for one generation run, in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Run access-path and cutaway-layer synthesis.
    #[serde(default = "default_true")]
    pub auxiliary_enabled: bool,

    /// Persist plan-only and static packs.
    #[serde(default)]
    pub cache_fallback_packs: bool,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_deadline_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            auxiliary_enabled: default_true(),
            cache_fallback_packs: false,
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            auxiliary_enabled: self.auxiliary_enabled,
            cache_fallback_packs: self.cache_fallback_packs,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.deadline_secs == 0 {
            return Err("deadline_secs must be positive".to_string());
        }
        self.retry.validate()
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Reasoning(String),
    Image(String),
    Pipeline(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Reasoning(msg) => write!(f, "Reasoning provider: {}", msg),
            ValidationError::Image(msg) => write!(f, "Image provider: {}", msg),
            ValidationError::Pipeline(msg) => write!(f, "Pipeline: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl OverlayConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if let Err(e) = self.reasoning.validate() {
            errors.push(ValidationError::Reasoning(e));
        }
        if let Err(e) = self.image.validate() {
            errors.push(ValidationError::Image(e));
        }
        if let Err(e) = self.pipeline.validate() {
            errors.push(ValidationError::Pipeline(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validation folded into one `ConfigError`.
    pub fn ensure_valid(&self) -> Result<(), OverlayError> {
        self.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            OverlayError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })
    }

    /// TOML rendering, used by `config init` and `config show`.
    pub fn to_toml(&self) -> Result<String, OverlayError> {
        toml::to_string_pretty(self)
            .map_err(|e| OverlayError::ConfigError(format!("Failed to render config: {}", e)))
    }
}
