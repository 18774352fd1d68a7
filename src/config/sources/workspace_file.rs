//! Workspace config file source: config/config.toml and config/{env}.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::{Path, PathBuf};

pub const ENV_SELECTOR: &str = "OVERLAY_ENV";

/// Base workspace config file, written by `config init`.
pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join("config").join("config.toml")
}

/// Add workspace config files to builder.
/// Precedence: config/config.toml (base) then config/{OVERLAY_ENV}.toml (env-specific).
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let base_config_path = workspace_config_path(workspace_root);
    let config_dir = workspace_root.join("config");
    let env_name = std::env::var(ENV_SELECTOR).unwrap_or_else(|_| "development".to_string());

    let mut builder = builder;

    if base_config_path.exists() {
        builder = builder.add_source(File::from(base_config_path).required(false));
    }

    let env_config_path = config_dir.join(format!("{}.toml", env_name));
    if env_config_path.exists() {
        builder = builder.add_source(File::from(env_config_path).required(false));
    }

    Ok(builder)
}
