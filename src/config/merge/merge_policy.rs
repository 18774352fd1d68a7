//! Merge rules: built-in defaults underneath every file and env source.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override earlier ones key by key, so a file that sets only
/// `pipeline.deadline_secs` keeps every other default.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("reasoning.provider_type", "openai")?
        .set_default("reasoning.model", "gpt-4o")?
        .set_default("image.model", "gpt-image-1")?
        .set_default("image.size", "1024x1024")?
        .set_default("image.quality", "high")?
        .set_default("pipeline.deadline_secs", 60_i64)?
        .set_default("pipeline.auxiliary_enabled", true)?
        .set_default("pipeline.cache_fallback_packs", false)?
        .set_default("logging.level", "info")
}
