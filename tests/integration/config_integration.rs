//! Configuration layering and service wiring from configuration.

use overlay_forge::api::OverlayService;
use overlay_forge::config::{global_config_path, ConfigLoader, OverlayConfig};
use overlay_forge::provider::ProviderType;
use std::sync::Mutex;
use tempfile::TempDir;

/// Serializes tests that touch process environment.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

struct EnvGuard {
    vars: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    fn set(pairs: &[(&'static str, String)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(name, value)| {
                let previous = std::env::var(name).ok();
                std::env::set_var(name, value);
                (*name, previous)
            })
            .collect();
        Self { vars }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, previous) in self.vars.drain(..) {
            match previous {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

#[test]
fn test_global_file_under_xdg_config_home() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let xdg = TempDir::new().unwrap();
    let _env = EnvGuard::set(&[("XDG_CONFIG_HOME", xdg.path().to_string_lossy().to_string())]);

    let path = global_config_path().unwrap();
    assert_eq!(path, xdg.path().join("overlay-forge").join("config.toml"));
}

#[test]
fn test_workspace_file_overrides_global_file() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let xdg = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let _env = EnvGuard::set(&[("XDG_CONFIG_HOME", xdg.path().to_string_lossy().to_string())]);

    let global = xdg.path().join("overlay-forge");
    std::fs::create_dir_all(&global).unwrap();
    std::fs::write(
        global.join("config.toml"),
        "[reasoning]\nprovider_type = \"anthropic\"\nmodel = \"claude-sonnet\"\n[pipeline]\ncache_fallback_packs = true\n",
    )
    .unwrap();
    std::fs::create_dir_all(workspace.path().join("config")).unwrap();
    std::fs::write(
        workspace.path().join("config/config.toml"),
        "[reasoning]\nmodel = \"claude-haiku\"\n",
    )
    .unwrap();

    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.reasoning.provider_type, ProviderType::Anthropic);
    assert_eq!(config.reasoning.model, "claude-haiku");
    assert!(config.pipeline.cache_fallback_packs);
}

#[test]
fn test_api_key_from_environment_satisfies_validation() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let _env = EnvGuard::set(&[
        ("OPENAI_API_KEY", "sk-from-env".to_string()),
        ("OVERLAY__IMAGE__QUALITY", "medium".to_string()),
    ]);
    let workspace = TempDir::new().unwrap();
    let xdg = TempDir::new().unwrap();
    let _xdg = EnvGuard::set(&[("XDG_CONFIG_HOME", xdg.path().to_string_lossy().to_string())]);

    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.image.quality, "medium");
    assert_eq!(config.reasoning.resolved_api_key().as_deref(), Some("sk-from-env"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_service_from_local_config() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let data = TempDir::new().unwrap();
    let mut config = OverlayConfig::default();
    config.reasoning.provider_type = ProviderType::Ollama;
    config.reasoning.model = "llama3".to_string();
    config.image.base_url = Some("http://localhost:9000/v1".to_string());
    config.storage.data_dir = Some(data.path().to_path_buf());

    let service = OverlayService::from_config(&config).unwrap();
    assert_eq!(service.in_flight(), 0);
    assert!(data.path().join("images").exists());
}

#[test]
fn test_service_from_invalid_config_fails() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let mut config = OverlayConfig::default();
    config.reasoning.provider_type = ProviderType::LocalCustom;
    config.pipeline.deadline_secs = 0;

    let err = OverlayService::from_config(&config).err().unwrap();
    assert_eq!(err.kind(), "config");
    assert!(err.to_string().contains("Pipeline"));
}
