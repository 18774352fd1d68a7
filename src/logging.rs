//! Logging System
//!
//! Structured logging on `tracing`. Level, format and destination come from
//! configuration and can be overridden through the environment.

use crate::error::OverlayError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const LOG_ENV: &str = "OVERLAY_LOG";
pub const LOG_FORMAT_ENV: &str = "OVERLAY_LOG_FORMAT";
pub const LOG_OUTPUT_ENV: &str = "OVERLAY_LOG_OUTPUT";
pub const LOG_MODULES_ENV: &str = "OVERLAY_LOG_MODULES";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output is "file"
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Colored output (text format on a terminal only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

// Command output goes to stdout; logs stay out of its way.
fn default_output() -> String {
    "stderr".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("overlay-forge.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogOutput {
    Stdout,
    Stderr,
    File,
}

/// Initialize the global subscriber.
///
/// Priority order (highest to lowest):
/// 1. Environment variables (OVERLAY_LOG, OVERLAY_LOG_FORMAT, OVERLAY_LOG_OUTPUT, OVERLAY_LOG_MODULES)
/// 2. The given configuration (CLI flags are folded into it by the binary)
/// 3. Defaults
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), OverlayError> {
    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let use_color = config.map(|c| c.color).unwrap_or(true) && output != LogOutput::File;

    let writer = match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::File => {
            let log_file = config.map(|c| c.file.clone()).unwrap_or_else(default_log_file);
            if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    OverlayError::ConfigError(format!("Failed to create log directory: {}", e))
                })?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .map_err(|e| {
                    OverlayError::ConfigError(format!(
                        "Failed to open log file {:?}: {}",
                        log_file, e
                    ))
                })?;
            BoxMakeWriter::new(file)
        }
    };

    let registry = Registry::default().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_color)
                    .with_writer(writer),
            )
            .try_init(),
    };
    result.map_err(|e| OverlayError::ConfigError(format!("Failed to initialize logging: {}", e)))
}

fn parse_directive(directive: &str) -> Result<tracing_subscriber::filter::Directive, OverlayError> {
    directive
        .parse()
        .map_err(|e| OverlayError::ConfigError(format!("Invalid log directive '{}': {}", directive, e)))
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, OverlayError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);

    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            filter = filter.add_directive(parse_directive(&format!("{}={}", module, module_level))?);
        }
    }

    if let Ok(modules) = std::env::var(LOG_MODULES_ENV) {
        for spec in modules.split(',') {
            if let Some((module, module_level)) = spec.split_once('=') {
                filter = filter.add_directive(parse_directive(&format!(
                    "{}={}",
                    module.trim(),
                    module_level.trim()
                ))?);
            }
        }
    }

    Ok(filter)
}

fn parse_format(format: &str) -> Option<LogFormat> {
    match format {
        "json" => Some(LogFormat::Json),
        "text" => Some(LogFormat::Text),
        _ => None,
    }
}

fn determine_format(config: Option<&LoggingConfig>) -> Result<LogFormat, OverlayError> {
    if let Some(format) = std::env::var(LOG_FORMAT_ENV).ok().and_then(|f| parse_format(&f)) {
        return Ok(format);
    }
    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    parse_format(format).ok_or_else(|| {
        OverlayError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        ))
    })
}

fn determine_output(config: Option<&LoggingConfig>) -> Result<LogOutput, OverlayError> {
    if let Ok(output) = std::env::var(LOG_OUTPUT_ENV) {
        return parse_output(&output);
    }
    parse_output(config.map(|c| c.output.as_str()).unwrap_or("stderr"))
}

fn parse_output(output: &str) -> Result<LogOutput, OverlayError> {
    match output {
        "stdout" => Ok(LogOutput::Stdout),
        "stderr" => Ok(LogOutput::Stderr),
        "file" => Ok(LogOutput::File),
        _ => Err(OverlayError::ConfigError(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr', or 'file')",
            output
        ))),
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if parse_format(&self.format).is_none() {
            return Err(format!("Invalid log format: {}", self.format));
        }
        parse_output(&self.output).map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "text");
        assert_eq!(config.output, "stderr");
        assert!(config.color);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_output() {
        assert_eq!(parse_output("stdout").unwrap(), LogOutput::Stdout);
        assert_eq!(parse_output("file").unwrap(), LogOutput::File);
        assert!(parse_output("both").is_err());
    }

    #[test]
    fn test_invalid_format_rejected() {
        let config = LoggingConfig {
            format: "xml".to_string(),
            ..LoggingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_module_directives() {
        let mut config = LoggingConfig::default();
        config
            .modules
            .insert("overlay_forge::phases".to_string(), "debug".to_string());
        assert!(build_env_filter(Some(&config)).is_ok());
    }
}
