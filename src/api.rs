//! Overlay Service API
//!
//! Entry point for hosts: classify the vehicle, resolve the workspace, derive
//! the cache key, then either serve the cached pack or run the pipeline under
//! the key's generation lock. Concurrent requests for one key share a single
//! pipeline run.

use crate::concurrency::GenerationLockManager;
use crate::config::OverlayConfig;
use crate::error::OverlayError;
use crate::hosting::{FsImageHost, ImageHost};
use crate::key::CacheKey;
use crate::orchestrator::{Orchestrator, OrchestratorOptions, PipelineState};
use crate::phases::{AuxiliaryPhases, PlanningPhase, VisualPhase};
use crate::provider::{ImageProvider, ProviderFactory, ReasoningProvider};
use crate::resolve::{
    KeywordWorkspaceResolver, MakeModelClassifier, VehicleClassifier, WorkspaceResolver,
};
use crate::retry::RetryPolicy;
use crate::store::{CacheStoreClient, MemoryPackStore, PackStore, SledPackStore};
use crate::types::{OverlayPack, RepairIntent, VehicleDescriptor, WorkspaceType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Where a served pack came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackOrigin {
    Cache,
    Generated,
}

impl PackOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackOrigin::Cache => "cache",
            PackOrigin::Generated => "generated",
        }
    }
}

/// A pack handed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ServedPack {
    pub key: CacheKey,
    pub pack: OverlayPack,
    pub origin: PackOrigin,
    /// Pipeline states visited; empty for cache hits.
    pub trace: Vec<PipelineState>,
    pub stored: bool,
}

pub struct OverlayService {
    classifier: Arc<dyn VehicleClassifier>,
    resolver: Arc<dyn WorkspaceResolver>,
    locks: GenerationLockManager<ServedPack>,
    cache: CacheStoreClient,
    orchestrator: Orchestrator,
    deadline: Duration,
}

impl OverlayService {
    pub fn builder() -> OverlayServiceBuilder {
        OverlayServiceBuilder::default()
    }

    /// Wire the service from configuration: provider clients from the
    /// provider sections, a sled store and a filesystem image host under
    /// the storage paths.
    pub fn from_config(config: &OverlayConfig) -> Result<Self, OverlayError> {
        config.ensure_valid()?;
        let reasoning = ProviderFactory::create_reasoning_client(&config.reasoning)?;
        let image = ProviderFactory::create_image_client(&config.image)?;
        let host = FsImageHost::new(config.storage.image_dir_path())?;
        let store = SledPackStore::new(config.storage.pack_db_path())?;

        Self::builder()
            .reasoning(reasoning)
            .image(image)
            .image_host(Arc::new(host))
            .store(Arc::new(store))
            .retry(RetryPolicy::from(&config.pipeline.retry))
            .max_output_tokens(config.reasoning.max_output_tokens)
            .image_size(config.image.size.clone())
            .image_quality(config.image.quality.clone())
            .deadline(config.pipeline.deadline())
            .options(config.pipeline.orchestrator_options())
            .build()
    }

    /// Key for a request without touching any provider or store.
    pub fn key_for(&self, vehicle: &VehicleDescriptor, repair: &RepairIntent) -> CacheKey {
        CacheKey::new(
            self.classifier.classify(vehicle),
            self.resolver.resolve(repair),
        )
    }

    pub async fn get_or_generate(
        &self,
        vehicle: &VehicleDescriptor,
        repair: &RepairIntent,
    ) -> Result<ServedPack, OverlayError> {
        let workspace = self.resolver.resolve(repair);
        self.get_or_generate_in(vehicle, workspace, repair).await
    }

    /// Same as [`get_or_generate`](Self::get_or_generate) with the workspace
    /// chosen by the caller.
    pub async fn get_or_generate_in(
        &self,
        vehicle: &VehicleDescriptor,
        workspace: WorkspaceType,
        repair: &RepairIntent,
    ) -> Result<ServedPack, OverlayError> {
        let start = Instant::now();
        let key = CacheKey::new(self.classifier.classify(vehicle), workspace);
        debug!(key = %key, repair = repair.as_str(), "Overlay pack requested");

        let served = self
            .locks
            .run_exclusive(&key, self.deadline, || async {
                if let Some(pack) = self.cache.get(&key).await {
                    return Ok(ServedPack {
                        key: key.clone(),
                        pack,
                        origin: PackOrigin::Cache,
                        trace: Vec::new(),
                        stored: true,
                    });
                }
                let outcome = self.orchestrator.run(&key, vehicle, repair).await?;
                Ok(ServedPack {
                    key: key.clone(),
                    pack: outcome.pack,
                    origin: PackOrigin::Generated,
                    trace: outcome.trace,
                    stored: outcome.stored,
                })
            })
            .await?;

        info!(
            key = %key,
            origin = served.origin.as_str(),
            tier = served.pack.tier.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Overlay pack served"
        );
        Ok(served)
    }

    /// Read-only lookup; does not bump the usage count.
    pub async fn cached(&self, key: &CacheKey) -> Result<Option<OverlayPack>, OverlayError> {
        self.cache.peek(key).await
    }

    pub async fn list(&self) -> Result<Vec<OverlayPack>, OverlayError> {
        self.cache.list().await
    }

    /// Keys with a pipeline currently running.
    pub fn in_flight(&self) -> usize {
        self.locks.in_flight()
    }
}

/// Assembles an [`OverlayService`] from injected parts.
pub struct OverlayServiceBuilder {
    reasoning: Option<Arc<dyn ReasoningProvider>>,
    image: Option<Arc<dyn ImageProvider>>,
    image_host: Option<Arc<dyn ImageHost>>,
    store: Option<Arc<dyn PackStore>>,
    classifier: Arc<dyn VehicleClassifier>,
    resolver: Arc<dyn WorkspaceResolver>,
    retry: RetryPolicy,
    max_output_tokens: u32,
    image_size: String,
    image_quality: String,
    deadline: Duration,
    options: OrchestratorOptions,
}

impl Default for OverlayServiceBuilder {
    fn default() -> Self {
        Self {
            reasoning: None,
            image: None,
            image_host: None,
            store: None,
            classifier: Arc::new(MakeModelClassifier),
            resolver: Arc::new(KeywordWorkspaceResolver),
            retry: RetryPolicy::default(),
            max_output_tokens: 2048,
            image_size: "1024x1024".to_string(),
            image_quality: "high".to_string(),
            deadline: crate::concurrency::DEFAULT_PIPELINE_DEADLINE,
            options: OrchestratorOptions::default(),
        }
    }
}

impl OverlayServiceBuilder {
    pub fn reasoning(mut self, provider: Arc<dyn ReasoningProvider>) -> Self {
        self.reasoning = Some(provider);
        self
    }

    pub fn image(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.image = Some(provider);
        self
    }

    pub fn image_host(mut self, host: Arc<dyn ImageHost>) -> Self {
        self.image_host = Some(host);
        self
    }

    /// Defaults to an in-memory store.
    pub fn store(mut self, store: Arc<dyn PackStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn VehicleClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn workspace_resolver(mut self, resolver: Arc<dyn WorkspaceResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    pub fn image_size(mut self, size: impl Into<String>) -> Self {
        self.image_size = size.into();
        self
    }

    pub fn image_quality(mut self, quality: impl Into<String>) -> Self {
        self.image_quality = quality.into();
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<OverlayService, OverlayError> {
        let missing = |what: &str| OverlayError::ConfigError(format!("{} is required", what));
        let reasoning = self.reasoning.ok_or_else(|| missing("reasoning provider"))?;
        let image = self.image.ok_or_else(|| missing("image provider"))?;
        let host = self.image_host.ok_or_else(|| missing("image host"))?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryPackStore::new()));
        let cache = CacheStoreClient::new(store);

        let orchestrator = Orchestrator::new(
            PlanningPhase::new(
                Arc::clone(&reasoning),
                self.retry.clone(),
                self.max_output_tokens,
            ),
            VisualPhase::new(
                image,
                host,
                self.retry.clone(),
                self.image_size,
                self.image_quality,
            ),
            AuxiliaryPhases::new(reasoning, self.retry, self.max_output_tokens),
            cache.clone(),
            self.options,
        );

        Ok(OverlayService {
            classifier: self.classifier,
            resolver: self.resolver,
            locks: GenerationLockManager::new(self.deadline),
            cache,
            orchestrator,
            deadline: self.deadline,
        })
    }
}
