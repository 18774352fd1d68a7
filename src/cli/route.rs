//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::api::OverlayService;
use crate::cli::parse::{command_name, Commands, ConfigCommands};
use crate::cli::presentation::{
    format_key_text, format_pack_json, format_pack_list_json, format_pack_list_text,
    format_pack_text, format_resolve_text, format_served_json, format_served_text,
};
use crate::config::{workspace_config_path, ConfigLoader, OverlayConfig};
use crate::error::OverlayError;
use crate::key::CacheKey;
use crate::resolve::{KeywordWorkspaceResolver, WorkspaceResolver};
use crate::store::{CacheStoreClient, SledPackStore};
use crate::types::{RepairIntent, WorkspaceType};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const REDACTED: &str = "********";

/// Runtime context for CLI execution: workspace, config, and config path.
/// Built from the workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config: OverlayConfig,
    config_path: Option<PathBuf>,
}

impl RunContext {
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, OverlayError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self {
            workspace_root,
            config,
            config_path,
        })
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, OverlayError> {
        let started = Instant::now();
        let name = command_name(command);
        debug!(command = name, "Executing command");
        let result = self.execute_inner(command);
        info!(
            command = name,
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, OverlayError> {
        match command {
            Commands::Generate {
                vehicle,
                repair,
                workspace_type,
                format,
            } => {
                let service = OverlayService::from_config(&self.config)?;
                let vehicle = vehicle.to_descriptor();
                let repair = RepairIntent::new(repair);
                let workspace = workspace_type
                    .as_deref()
                    .map(str::parse::<WorkspaceType>)
                    .transpose()?;
                let served = block_on(async {
                    match workspace {
                        Some(ws) => service.get_or_generate_in(&vehicle, ws, &repair).await,
                        None => service.get_or_generate(&vehicle, &repair).await,
                    }
                })??;
                if format == "json" {
                    format_served_json(&served)
                } else {
                    Ok(format_served_text(&served))
                }
            }
            Commands::Show {
                family,
                workspace_type,
                format,
            } => {
                let key = CacheKey::new(family.clone(), workspace_type.parse()?);
                let cache = self.open_cache()?;
                match block_on(cache.peek(&key))?? {
                    Some(pack) if format == "json" => format_pack_json(&pack),
                    Some(pack) => Ok(format_pack_text(&pack)),
                    None => Err(OverlayError::CacheError(format!(
                        "No cached pack for {}",
                        key
                    ))),
                }
            }
            Commands::List { format } => {
                let cache = self.open_cache()?;
                let packs = block_on(cache.list())??;
                if format == "json" {
                    format_pack_list_json(&packs)
                } else {
                    Ok(format_pack_list_text(&packs))
                }
            }
            Commands::Key {
                family,
                workspace_type,
            } => {
                let key = CacheKey::new(family.clone(), workspace_type.parse()?);
                Ok(format_key_text(&key))
            }
            Commands::Resolve { repair } => {
                let repair = RepairIntent::new(repair);
                let workspace = KeywordWorkspaceResolver.resolve(&repair);
                Ok(format_resolve_text(&repair, workspace))
            }
            Commands::Config { command } => self.handle_config_command(command),
        }
    }

    fn handle_config_command(&self, command: &ConfigCommands) -> Result<String, OverlayError> {
        match command {
            ConfigCommands::Init { force } => {
                let path = workspace_config_path(&self.workspace_root);
                if path.exists() && !force {
                    return Err(OverlayError::ConfigError(format!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    )));
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        OverlayError::ConfigError(format!(
                            "Failed to create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
                let rendered = ConfigLoader::default().to_toml()?;
                std::fs::write(&path, rendered).map_err(|e| {
                    OverlayError::ConfigError(format!("Failed to write {}: {}", path.display(), e))
                })?;
                Ok(format!("Wrote default configuration to {}", path.display()))
            }
            ConfigCommands::Show => {
                let mut shown = self.config.clone();
                if shown.reasoning.api_key.is_some() {
                    shown.reasoning.api_key = Some(REDACTED.to_string());
                }
                if shown.image.api_key.is_some() {
                    shown.image.api_key = Some(REDACTED.to_string());
                }
                let source = match self.config_path {
                    Some(ref path) => format!("# Loaded from {}\n", path.display()),
                    None => format!("# Layered for workspace {}\n", self.workspace_root.display()),
                };
                Ok(format!("{}{}", source, shown.to_toml()?))
            }
        }
    }

    /// Cache client over the configured sled store, no providers needed.
    fn open_cache(&self) -> Result<CacheStoreClient, OverlayError> {
        let store = SledPackStore::new(self.config.storage.pack_db_path())?;
        Ok(CacheStoreClient::new(Arc::new(store)))
    }
}

fn block_on<F: Future>(future: F) -> Result<F::Output, OverlayError> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        OverlayError::GenerationError(format!("Failed to create runtime: {}", e))
    })?;
    Ok(rt.block_on(future))
}
