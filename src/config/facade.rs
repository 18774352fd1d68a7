//! Config loading entry points.

use crate::config::merge::merge_policy::builder_with_defaults;
use crate::config::sources::{global_file, workspace_file};
use crate::config::OverlayConfig;
use config::{ConfigError, Environment, File};
use std::path::Path;

/// Prefix for environment overrides, e.g. `OVERLAY__PIPELINE__DEADLINE_SECS`.
pub const ENV_PREFIX: &str = "OVERLAY";
const ENV_SEPARATOR: &str = "__";

pub struct ConfigLoader;

impl ConfigLoader {
    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
    }

    /// Defaults, then the global file, then the workspace files, then the
    /// environment.
    pub fn load(workspace_root: &Path) -> Result<OverlayConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        builder
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    /// Defaults, then exactly `path`, then the environment.
    pub fn load_from_file(path: &Path) -> Result<OverlayConfig, ConfigError> {
        builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    pub fn default() -> OverlayConfig {
        OverlayConfig::default()
    }
}
