//! Fallback Controller / Orchestrator
//!
//! Sequences one generation run for a key:
//!
//! ```text
//! NotStarted -> PlanningInFlight -> ImageInFlight -> GeometryInFlight -> Assembling -> Cached
//!                     |                   |
//!                     |                   +-> FailedFallbackToVectorOnly
//!                     +-----------------------> FailedFallbackToStatic
//! ```
//!
//! Provider, parse and generation errors in planning or visual generation
//! drop the run to the next tier. A pack that fails geometric validation is
//! never stored and the `ValidationError` goes back to the caller.

use crate::assembly::{ArtifactAssembler, PackDraft};
use crate::error::OverlayError;
use crate::geometry::validate_pack;
use crate::key::CacheKey;
use crate::phases::{AuxiliaryOutput, AuxiliaryPhases, PlanningPhase, TechnicalPlan, VisualPhase};
use crate::store::CacheStoreClient;
use crate::types::{
    CanvasSize, GenerationTier, OverlayPack, PackVisual, RepairIntent, VehicleDescriptor,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    NotStarted,
    PlanningInFlight,
    ImageInFlight,
    GeometryInFlight,
    Assembling,
    Cached,
    FailedFallbackToVectorOnly,
    FailedFallbackToStatic,
}

impl PipelineState {
    /// Terminal states all carry a renderable pack.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Cached
                | PipelineState::FailedFallbackToVectorOnly
                | PipelineState::FailedFallbackToStatic
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::NotStarted => "not_started",
            PipelineState::PlanningInFlight => "planning_in_flight",
            PipelineState::ImageInFlight => "image_in_flight",
            PipelineState::GeometryInFlight => "geometry_in_flight",
            PipelineState::Assembling => "assembling",
            PipelineState::Cached => "cached",
            PipelineState::FailedFallbackToVectorOnly => "failed_fallback_to_vector_only",
            PipelineState::FailedFallbackToStatic => "failed_fallback_to_static",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one orchestrated run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub pack: OverlayPack,
    /// Every state visited, in order, ending in a terminal state.
    pub trace: Vec<PipelineState>,
    /// Whether the pack reached the durable store.
    pub stored: bool,
}

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub auxiliary_enabled: bool,
    /// Persist plan-only and static packs too. Off by default so a later
    /// request retries the full pipeline.
    pub cache_fallback_packs: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            auxiliary_enabled: true,
            cache_fallback_packs: false,
        }
    }
}

pub struct Orchestrator {
    planning: PlanningPhase,
    visual: VisualPhase,
    auxiliary: AuxiliaryPhases,
    assembler: ArtifactAssembler,
    cache: CacheStoreClient,
    options: OrchestratorOptions,
}

struct Trace<'a> {
    key: &'a CacheKey,
    states: Vec<PipelineState>,
}

impl<'a> Trace<'a> {
    fn new(key: &'a CacheKey) -> Self {
        Self {
            key,
            states: vec![PipelineState::NotStarted],
        }
    }

    fn enter(&mut self, state: PipelineState) {
        let from = self.states.last().copied().unwrap_or(PipelineState::NotStarted);
        debug!(key = %self.key, from = from.as_str(), to = state.as_str(), "Pipeline transition");
        self.states.push(state);
    }
}

impl Orchestrator {
    pub fn new(
        planning: PlanningPhase,
        visual: VisualPhase,
        auxiliary: AuxiliaryPhases,
        cache: CacheStoreClient,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            planning,
            visual,
            auxiliary,
            assembler: ArtifactAssembler,
            cache,
            options,
        }
    }

    /// Run the pipeline for a cache miss.
    ///
    /// Returns a validated pack for every tier. Errors are limited to
    /// `ValidationError`.
    pub async fn run(
        &self,
        key: &CacheKey,
        vehicle: &VehicleDescriptor,
        repair: &RepairIntent,
    ) -> Result<PipelineOutcome, OverlayError> {
        let start = Instant::now();
        let mut trace = Trace::new(key);

        trace.enter(PipelineState::PlanningInFlight);
        let plan = match self.planning.run(vehicle, key.workspace_type, repair).await {
            Ok(plan) => plan,
            Err(err) => {
                warn!(key = %key, phase = "planning", error = %err, kind = err.kind(), "Planning failed, falling back to static pack");
                return self.finish_static(key, repair, trace, start).await;
            }
        };

        trace.enter(PipelineState::ImageInFlight);
        let visual = match self.visual.run(key, vehicle, repair, &plan).await {
            Ok(visual) => visual,
            Err(err) => {
                warn!(key = %key, phase = "visual", error = %err, kind = err.kind(), "Visual generation failed, falling back to plan-only pack");
                return self.finish_plan_only(key, repair, &plan, trace, start).await;
            }
        };

        trace.enter(PipelineState::GeometryInFlight);
        let mut parts = plan.synthesize_parts();
        if parts.is_empty() {
            parts = self.assembler.static_parts(repair);
        }
        let auxiliary = if self.options.auxiliary_enabled {
            self.auxiliary.run(vehicle, key.workspace_type, &parts).await
        } else {
            AuxiliaryOutput::default()
        };

        trace.enter(PipelineState::Assembling);
        let pack = self.assembler.assemble(
            key,
            PackDraft {
                visual: PackVisual::Image {
                    url: visual.image_url,
                },
                canvas: visual.canvas,
                parts,
                auxiliary,
                provider_tag: self.assembler.provider_tag(
                    Some(self.planning.model_name()),
                    Some(self.visual.model_name()),
                ),
                tier: GenerationTier::Full,
            },
        );
        self.finish(key, pack, PipelineState::Cached, trace, start).await
    }

    async fn finish_plan_only(
        &self,
        key: &CacheKey,
        repair: &RepairIntent,
        plan: &TechnicalPlan,
        mut trace: Trace<'_>,
        start: Instant,
    ) -> Result<PipelineOutcome, OverlayError> {
        let parts = plan.synthesize_parts();
        if parts.is_empty() {
            warn!(key = %key, "Plan produced no parts, falling back to static pack");
            return self.finish_static(key, repair, trace, start).await;
        }

        trace.enter(PipelineState::FailedFallbackToVectorOnly);
        let scene = self.assembler.vector_scene(&parts);
        let pack = self.assembler.assemble(
            key,
            PackDraft {
                visual: PackVisual::VectorScene(scene),
                canvas: CanvasSize::default(),
                parts,
                auxiliary: AuxiliaryOutput::default(),
                provider_tag: self.assembler.provider_tag(Some(self.planning.model_name()), None),
                tier: GenerationTier::PlanOnly,
            },
        );
        self.finish(key, pack, PipelineState::FailedFallbackToVectorOnly, trace, start)
            .await
    }

    async fn finish_static(
        &self,
        key: &CacheKey,
        repair: &RepairIntent,
        mut trace: Trace<'_>,
        start: Instant,
    ) -> Result<PipelineOutcome, OverlayError> {
        trace.enter(PipelineState::FailedFallbackToStatic);
        let parts = self.assembler.static_parts(repair);
        let scene = self.assembler.vector_scene(&parts);
        let pack = self.assembler.assemble(
            key,
            PackDraft {
                visual: PackVisual::VectorScene(scene),
                canvas: CanvasSize::default(),
                parts,
                auxiliary: AuxiliaryOutput::default(),
                provider_tag: self.assembler.provider_tag(None, None),
                tier: GenerationTier::Static,
            },
        );
        self.finish(key, pack, PipelineState::FailedFallbackToStatic, trace, start)
            .await
    }

    /// Validate, store, and close the trace. `terminal` is only pushed for the
    /// full tier; fallback states were entered by the caller.
    async fn finish(
        &self,
        key: &CacheKey,
        pack: OverlayPack,
        terminal: PipelineState,
        mut trace: Trace<'_>,
        start: Instant,
    ) -> Result<PipelineOutcome, OverlayError> {
        if let Err(err) = validate_pack(&pack) {
            warn!(key = %key, tier = pack.tier.as_str(), error = %err, "Assembled pack failed validation, discarding");
            return Err(err);
        }

        let persist = pack.tier == GenerationTier::Full || self.options.cache_fallback_packs;
        let stored = if persist {
            self.cache.put(key, &pack).await
        } else {
            false
        };
        if terminal == PipelineState::Cached {
            trace.enter(terminal);
        }

        info!(
            key = %key,
            tier = pack.tier.as_str(),
            parts = pack.parts.len(),
            access_paths = pack.access_paths.len(),
            layers = pack.layers.len(),
            stored,
            duration_ms = start.elapsed().as_millis() as u64,
            "Overlay pack generated"
        );
        Ok(PipelineOutcome {
            pack,
            trace: trace.states,
            stored,
        })
    }
}
