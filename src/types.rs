//! Core data model for overlay packs.

use crate::error::OverlayError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Vehicle being repaired. Immutable input to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDescriptor {
    pub year: u16,
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub trim: Option<String>,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub drivetrain: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    /// "LHD" or "RHD"
    #[serde(default)]
    pub steering: Option<String>,
}

impl VehicleDescriptor {
    pub fn new(year: u16, make: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            year,
            make: make.into(),
            model: model.into(),
            trim: None,
            engine: None,
            drivetrain: None,
            market: None,
            steering: None,
        }
    }

    /// Human-readable name, e.g. "2020 Toyota Camry LE".
    pub fn display_name(&self) -> String {
        let mut name = format!("{} {} {}", self.year, self.make, self.model);
        if let Some(trim) = self.trim.as_deref().filter(|t| !t.trim().is_empty()) {
            name.push(' ');
            name.push_str(trim.trim());
        }
        name
    }

    pub fn is_right_hand_drive(&self) -> bool {
        self.steering
            .as_deref()
            .map(|s| s.trim().eq_ignore_ascii_case("rhd") || s.to_lowercase().contains("right"))
            .unwrap_or(false)
    }
}

/// Physical area of the vehicle where the repair takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceType {
    EngineFront,
    Undercarriage,
    WheelAssembly,
    Interior,
    TrunkRear,
}

impl WorkspaceType {
    pub const ALL: [WorkspaceType; 5] = [
        WorkspaceType::EngineFront,
        WorkspaceType::Undercarriage,
        WorkspaceType::WheelAssembly,
        WorkspaceType::Interior,
        WorkspaceType::TrunkRear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceType::EngineFront => "engine_front",
            WorkspaceType::Undercarriage => "undercarriage",
            WorkspaceType::WheelAssembly => "wheel_assembly",
            WorkspaceType::Interior => "interior",
            WorkspaceType::TrunkRear => "trunk_rear",
        }
    }

    /// Phrase used in provider prompts.
    pub fn describe(&self) -> &'static str {
        match self {
            WorkspaceType::EngineFront => "engine bay viewed from the front with the hood open",
            WorkspaceType::Undercarriage => "vehicle underside viewed from below on a lift",
            WorkspaceType::WheelAssembly => "wheel assembly with the wheel removed",
            WorkspaceType::Interior => "cabin interior viewed from the driver's door",
            WorkspaceType::TrunkRear => "rear cargo area with the trunk open",
        }
    }
}

impl fmt::Display for WorkspaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceType {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_token(s);
        WorkspaceType::ALL
            .iter()
            .copied()
            .find(|w| w.as_str() == normalized)
            .ok_or_else(|| OverlayError::ParseError(format!("Unknown workspace type: {}", s)))
    }
}

/// Identifier of the repair being performed, normalized to snake_case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepairIntent(String);

const REPAIR_ACTION_SUFFIXES: &[&str] = &[
    "_replacement",
    "_repair",
    "_inspection",
    "_service",
    "_change",
    "_swap",
    "_install",
    "_removal",
];

impl RepairIntent {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize_token(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part the repair is about: `battery_replacement` → `battery`.
    pub fn target_part(&self) -> String {
        for suffix in REPAIR_ACTION_SUFFIXES {
            if let Some(stripped) = self.0.strip_suffix(suffix) {
                if !stripped.is_empty() {
                    return stripped.to_string();
                }
            }
        }
        self.0.clone()
    }

    /// Space-separated form for prompts.
    pub fn human(&self) -> String {
        self.0.replace('_', " ")
    }
}

impl fmt::Display for RepairIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase, trims, and folds `-` and whitespace runs into `_`.
pub(crate) fn normalize_token(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch == '-' || ch == '_' || ch.is_whitespace() {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.extend(ch.to_lowercase());
    }
    out
}

/// A point in the unit square, independent of screen resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCoordinate {
    pub x: f64,
    pub y: f64,
}

impl NormalizedCoordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

impl From<[f64; 2]> for NormalizedCoordinate {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessibilityTier {
    Easy,
    Moderate,
    Difficult,
}

impl AccessibilityTier {
    /// Lenient parse of provider-supplied labels.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "easy" | "simple" | "accessible" => Some(AccessibilityTier::Easy),
            "moderate" | "medium" | "average" => Some(AccessibilityTier::Moderate),
            "difficult" | "hard" | "very_difficult" | "tight" => Some(AccessibilityTier::Difficult),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessibilityTier::Easy => "easy",
            AccessibilityTier::Moderate => "moderate",
            AccessibilityTier::Difficult => "difficult",
        }
    }
}

/// Highlighted component in the work area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayPart {
    pub polygon: Vec<NormalizedCoordinate>,
    pub highlight_color: String,
    pub part_type: String,
    pub accessibility: AccessibilityTier,
}

/// Animated route guiding the user toward a hard-to-reach part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPath {
    pub waypoints: Vec<NormalizedCoordinate>,
    pub duration_ms: u32,
    pub stroke_width: f32,
    pub dash_pattern: Vec<f32>,
}

/// Semi-transparent panel representing a removable obstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayLayer {
    pub polygon: Vec<NormalizedCoordinate>,
    pub tint_color: String,
    pub cutaway_opacity: f32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorShape {
    pub label: String,
    pub polygon: Vec<NormalizedCoordinate>,
    pub fill: String,
    pub stroke: String,
}

/// Legacy vector rendition of the work area, used when no image is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorScene {
    pub background: String,
    pub shapes: Vec<VectorShape>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackVisual {
    Image { url: String },
    VectorScene(VectorScene),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationTier {
    Full,
    PlanOnly,
    Static,
}

impl GenerationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationTier::Full => "full",
            GenerationTier::PlanOnly => "plan_only",
            GenerationTier::Static => "static",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    /// Parses provider size strings such as "1024x1536".
    pub fn parse(size: &str) -> Option<Self> {
        let (w, h) = size.trim().split_once(['x', 'X'])?;
        let width = w.trim().parse().ok()?;
        let height = h.trim().parse().ok()?;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
        }
    }
}

/// Cached bundle of visual and geometric data for one
/// (vehicle family, workspace) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayPack {
    pub id: String,
    pub vehicle_family: String,
    pub workspace_type: WorkspaceType,
    pub visual: PackVisual,
    pub canvas: CanvasSize,
    pub parts: BTreeMap<String, OverlayPart>,
    pub access_paths: BTreeMap<String, AccessPath>,
    pub layers: BTreeMap<String, OverlayLayer>,
    pub generated_at: DateTime<Utc>,
    pub provider_tag: String,
    pub tier: GenerationTier,
    pub usage_count: u64,
}

impl OverlayPack {
    pub fn image_url(&self) -> Option<&str> {
        match &self.visual {
            PackVisual::Image { url } => Some(url.as_str()),
            PackVisual::VectorScene(_) => None,
        }
    }

    pub fn vector_scene(&self) -> Option<&VectorScene> {
        match &self.visual {
            PackVisual::VectorScene(scene) => Some(scene),
            PackVisual::Image { .. } => None,
        }
    }
}
