//! CLI parse: clap types for overlay-forge. No behavior; definitions only.

use crate::types::VehicleDescriptor;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// overlay-forge CLI - AR overlay packs for vehicle repair work areas
#[derive(Parser)]
#[command(name = "overlay-forge")]
#[command(about = "Generate and inspect cached AR overlay packs for vehicle repairs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where config/ lives)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the overlay pack for a vehicle and repair, generating it on a miss
    Generate {
        #[command(flatten)]
        vehicle: VehicleArgs,
        /// Repair identifier, e.g. battery_replacement
        #[arg(long)]
        repair: String,
        /// Override the resolved workspace (engine_front, undercarriage, ...)
        #[arg(long)]
        workspace_type: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show a cached pack without bumping its usage count
    Show {
        #[arg(long)]
        family: String,
        #[arg(long)]
        workspace_type: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List cached packs
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the cache key and pack id for a family and workspace
    Key {
        #[arg(long)]
        family: String,
        #[arg(long)]
        workspace_type: String,
    },
    /// Resolve the workspace a repair happens in
    Resolve {
        #[arg(long)]
        repair: String,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration to <workspace>/config/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration (API keys redacted)
    Show,
}

#[derive(Args, Debug, Clone)]
pub struct VehicleArgs {
    #[arg(long)]
    pub year: u16,
    #[arg(long)]
    pub make: String,
    #[arg(long)]
    pub model: String,
    #[arg(long)]
    pub trim: Option<String>,
    #[arg(long)]
    pub engine: Option<String>,
    #[arg(long)]
    pub drivetrain: Option<String>,
    #[arg(long)]
    pub market: Option<String>,
    /// LHD or RHD
    #[arg(long)]
    pub steering: Option<String>,
}

impl VehicleArgs {
    pub fn to_descriptor(&self) -> VehicleDescriptor {
        VehicleDescriptor {
            year: self.year,
            make: self.make.clone(),
            model: self.model.clone(),
            trim: self.trim.clone(),
            engine: self.engine.clone(),
            drivetrain: self.drivetrain.clone(),
            market: self.market.clone(),
            steering: self.steering.clone(),
        }
    }
}

/// Stable command name for logs.
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Generate { .. } => "generate",
        Commands::Show { .. } => "show",
        Commands::List { .. } => "list",
        Commands::Key { .. } => "key",
        Commands::Resolve { .. } => "resolve",
        Commands::Config {
            command: ConfigCommands::Init { .. },
        } => "config init",
        Commands::Config {
            command: ConfigCommands::Show,
        } => "config show",
    }
}
