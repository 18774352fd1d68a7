//! overlay-forge CLI Binary
//!
//! Command-line interface for generating and inspecting overlay packs.

use clap::Parser;
use overlay_forge::cli::{Cli, RunContext};
use overlay_forge::config::ConfigLoader;
use overlay_forge::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);

    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("overlay-forge starting");

    let context = match RunContext::new(cli.workspace.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            eprintln!("{}", overlay_forge::cli::map_error(&e));
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!(error = %e, kind = e.kind(), "Command failed");
            eprintln!("{}", overlay_forge::cli::map_error(&e));
            process::exit(1);
        }
    }
}

/// Build logging configuration from CLI args and config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = match cli.config {
        Some(ref config_path) => ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
        None => ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
    };

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
        if cli.log_output.is_none() {
            config.output = "file".to_string();
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_logging_config_default() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().to_string_lossy();
        let cli = Cli::try_parse_from(["overlay-forge", "--workspace", ws.as_ref(), "list"]).unwrap();
        let config = build_logging_config(&cli);
        assert_eq!(config.output, "stderr");
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_build_logging_config_verbose() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().to_string_lossy();
        let cli = Cli::try_parse_from(["overlay-forge", "--workspace", ws.as_ref(), "--verbose", "list"])
            .unwrap();
        assert_eq!(build_logging_config(&cli).level, "debug");
    }

    #[test]
    fn test_explicit_level_wins_over_verbose() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().to_string_lossy();
        let cli = Cli::try_parse_from([
            "overlay-forge",
            "--workspace",
            ws.as_ref(),
            "--verbose",
            "--log-level",
            "warn",
            "list",
        ])
        .unwrap();
        assert_eq!(build_logging_config(&cli).level, "warn");
    }

    #[test]
    fn test_log_file_implies_file_output() {
        let temp = tempfile::tempdir().unwrap();
        let ws = temp.path().to_string_lossy();
        let log = temp.path().join("run.log");
        let cli = Cli::try_parse_from([
            "overlay-forge",
            "--workspace",
            ws.as_ref(),
            "--log-file",
            log.to_string_lossy().as_ref(),
            "list",
        ])
        .unwrap();
        let config = build_logging_config(&cli);
        assert_eq!(config.output, "file");
        assert_eq!(config.file, log);
    }
}
