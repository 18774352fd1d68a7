//! Artifact Assembler
//!
//! Composes phase outputs into an [`OverlayPack`]. Assembly is pure; the
//! orchestrator validates the result before anything is stored or returned.

use crate::geometry::{synthesize_rectangle, PositionLabel, SizeLabel};
use crate::key::CacheKey;
use crate::phases::AuxiliaryOutput;
use crate::types::{
    AccessibilityTier, CanvasSize, GenerationTier, NormalizedCoordinate, OverlayPack, OverlayPart,
    PackVisual, RepairIntent, VectorScene, VectorShape,
};
use chrono::Utc;
use std::collections::BTreeMap;

const SCENE_BACKGROUND: &str = "#1C1C1E";
const SHAPE_STROKE: &str = "#FFFFFF";
const STATIC_COLOR: &str = "#FF9500";
const STATIC_PART_NAME: &str = "work_area";

/// Phase outputs for one pack.
#[derive(Debug, Clone)]
pub struct PackDraft {
    pub visual: PackVisual,
    pub canvas: CanvasSize,
    pub parts: BTreeMap<String, OverlayPart>,
    pub auxiliary: AuxiliaryOutput,
    pub provider_tag: String,
    pub tier: GenerationTier,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactAssembler;

impl ArtifactAssembler {
    pub fn assemble(&self, key: &CacheKey, draft: PackDraft) -> OverlayPack {
        OverlayPack {
            id: key.pack_id(),
            vehicle_family: key.vehicle_family.clone(),
            workspace_type: key.workspace_type,
            visual: draft.visual,
            canvas: draft.canvas,
            parts: draft.parts,
            access_paths: draft.auxiliary.access_paths,
            layers: draft.auxiliary.layers,
            generated_at: Utc::now(),
            provider_tag: draft.provider_tag,
            tier: draft.tier,
            usage_count: 0,
        }
    }

    /// Vector stand-in for the image: a full-canvas background panel plus one
    /// shape per part.
    pub fn vector_scene(&self, parts: &BTreeMap<String, OverlayPart>) -> VectorScene {
        let mut shapes = vec![VectorShape {
            label: "background".to_string(),
            polygon: vec![
                NormalizedCoordinate::new(0.0, 0.0),
                NormalizedCoordinate::new(1.0, 0.0),
                NormalizedCoordinate::new(1.0, 1.0),
                NormalizedCoordinate::new(0.0, 1.0),
            ],
            fill: SCENE_BACKGROUND.to_string(),
            stroke: SCENE_BACKGROUND.to_string(),
        }];
        shapes.extend(parts.iter().map(|(name, part)| VectorShape {
            label: name.clone(),
            polygon: part.polygon.clone(),
            fill: part.highlight_color.clone(),
            stroke: SHAPE_STROKE.to_string(),
        }));
        VectorScene {
            background: SCENE_BACKGROUND.to_string(),
            shapes,
        }
    }

    /// The single generic part of the static tier.
    pub fn static_parts(&self, repair: &RepairIntent) -> BTreeMap<String, OverlayPart> {
        let target = repair.target_part();
        let name = if target.is_empty() {
            STATIC_PART_NAME.to_string()
        } else {
            target
        };
        let mut parts = BTreeMap::new();
        parts.insert(
            name,
            OverlayPart {
                polygon: synthesize_rectangle(PositionLabel::Center, SizeLabel::Medium),
                highlight_color: STATIC_COLOR.to_string(),
                part_type: "generic".to_string(),
                accessibility: AccessibilityTier::Moderate,
            },
        );
        parts
    }

    /// `<reasoning>+<image>`, `<reasoning>`, or `static`.
    pub fn provider_tag(&self, reasoning_model: Option<&str>, image_model: Option<&str>) -> String {
        match (reasoning_model, image_model) {
            (Some(reasoning), Some(image)) => format!("{}+{}", reasoning, image),
            (Some(reasoning), None) => reasoning.to_string(),
            (None, Some(image)) => image.to_string(),
            (None, None) => "static".to_string(),
        }
    }
}
