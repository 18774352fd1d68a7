//! Planning phase
//!
//! Asks the reasoning provider for a technical plan of the work area: a visual
//! brief for the image model, a qualitative layout per component, AR rendering
//! hints and vehicle-specific notes.

use crate::error::OverlayError;
use crate::extract::extract_json_object;
use crate::geometry::{synthesize_rectangle, PositionLabel, SizeLabel};
use crate::phases::{parse_points, str_field, string_list};
use crate::provider::{ReasoningProvider, ReasoningRequest};
use crate::retry::{retry, RetryPolicy};
use crate::types::{
    normalize_token, AccessibilityTier, NormalizedCoordinate, OverlayPart, RepairIntent,
    VehicleDescriptor, WorkspaceType,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const TARGET_COLOR: &str = "#FF3B30";
const COMPONENT_COLOR: &str = "#FFCC00";

const PLANNING_SYSTEM_PROMPT: &str = "You are an automotive repair technician and technical \
illustrator. You answer with a single JSON object and nothing else.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualBrief {
    pub viewpoint: String,
    pub style: String,
    pub contrast: String,
    pub target_part: String,
    /// Free text, e.g. "driver side, front of the engine bay".
    pub part_location: String,
}

/// Qualitative placement of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSpec {
    pub position: String,
    pub size: String,
    pub color: String,
    pub highlight_method: Option<String>,
    /// Explicit geometry from the provider, used as given.
    pub polygon: Option<Vec<NormalizedCoordinate>>,
    pub part_type: Option<String>,
    pub accessibility: Option<AccessibilityTier>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleNotes {
    pub engine_layout: String,
    pub accessibility: String,
    pub obstacles: Vec<String>,
    pub best_viewing_angle: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalPlan {
    pub visual_brief: VisualBrief,
    pub layout_specifications: BTreeMap<String, LayoutSpec>,
    pub ar_hints: Vec<String>,
    pub vehicle_notes: VehicleNotes,
    /// Layout entry the repair is about.
    pub target_part: String,
}

impl TechnicalPlan {
    /// Parse the extracted provider JSON.
    ///
    /// `visual_brief` and `layout_specifications` are required; everything
    /// else degrades to empty values.
    pub fn from_value(value: &Value) -> Result<Self, OverlayError> {
        let root = value
            .as_object()
            .ok_or_else(|| OverlayError::ParseError("plan is not a JSON object".to_string()))?;

        let brief = root
            .get("visual_brief")
            .ok_or_else(|| missing("visual_brief"))?;
        if !brief.is_object() {
            return Err(OverlayError::ParseError(
                "visual_brief must be an object".to_string(),
            ));
        }
        let visual_brief = VisualBrief {
            viewpoint: str_field(brief, "viewpoint"),
            style: str_field(brief, "style"),
            contrast: first_non_empty(&[
                str_field(brief, "contrast"),
                str_field(brief, "contrast_requirements"),
            ]),
            target_part: str_field(brief, "target_part"),
            part_location: first_non_empty(&[
                str_field(brief, "part_location"),
                str_field(brief, "location"),
            ]),
        };

        let layout = root
            .get("layout_specifications")
            .ok_or_else(|| missing("layout_specifications"))?;
        let layout_specifications = parse_layout(layout)?;

        let notes = root.get("vehicle_notes").cloned().unwrap_or(Value::Null);
        let vehicle_notes = VehicleNotes {
            engine_layout: str_field(&notes, "engine_layout"),
            accessibility: str_field(&notes, "accessibility"),
            obstacles: string_list(notes.get("obstacles")),
            best_viewing_angle: str_field(&notes, "best_viewing_angle"),
        };

        let target_part = normalize_token(&visual_brief.target_part);

        Ok(Self {
            visual_brief,
            layout_specifications,
            ar_hints: string_list(root.get("ar_hints")),
            vehicle_notes,
            target_part,
        })
    }

    /// Make `target` the plan's target part, adding a layout entry for it at
    /// the brief's part location when the provider left it out.
    pub fn ensure_target_part(&mut self, target: &str) {
        let target = normalize_token(target);
        if target.is_empty() {
            return;
        }
        if !self.layout_specifications.contains_key(&target) {
            let position = location_position(&self.visual_brief.part_location);
            debug!(part = %target, position = position.as_str(), "Target part missing from layout, inserting");
            self.layout_specifications.insert(
                target.clone(),
                LayoutSpec {
                    position: position.as_str().to_string(),
                    size: SizeLabel::Medium.as_str().to_string(),
                    color: TARGET_COLOR.to_string(),
                    highlight_method: None,
                    polygon: None,
                    part_type: Some("target".to_string()),
                    accessibility: None,
                },
            );
        }
        self.target_part = target;
    }

    /// Geometry synthesis: turn every layout entry into an overlay part.
    pub fn synthesize_parts(&self) -> BTreeMap<String, OverlayPart> {
        self.layout_specifications
            .iter()
            .map(|(name, spec)| {
                let polygon = match &spec.polygon {
                    Some(points) => points.clone(),
                    None => synthesize_rectangle(
                        PositionLabel::parse_or_default(&spec.position),
                        SizeLabel::parse_or_default(&spec.size),
                    ),
                };
                let is_target = *name == self.target_part;
                let part = OverlayPart {
                    polygon,
                    highlight_color: if spec.color.is_empty() {
                        default_color(is_target).to_string()
                    } else {
                        spec.color.clone()
                    },
                    part_type: spec.part_type.clone().unwrap_or_else(|| {
                        if is_target { "target" } else { "component" }.to_string()
                    }),
                    accessibility: spec.accessibility.unwrap_or(AccessibilityTier::Moderate),
                };
                (name.clone(), part)
            })
            .collect()
    }
}

fn missing(field: &str) -> OverlayError {
    OverlayError::ParseError(format!("plan is missing required field `{}`", field))
}

fn first_non_empty(candidates: &[String]) -> String {
    candidates
        .iter()
        .find(|c| !c.is_empty())
        .cloned()
        .unwrap_or_default()
}

fn default_color(is_target: bool) -> &'static str {
    if is_target {
        TARGET_COLOR
    } else {
        COMPONENT_COLOR
    }
}

/// Position label from free-text location; punctuation is ignored.
fn location_position(location: &str) -> PositionLabel {
    let cleaned: String = location
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    PositionLabel::parse_or_default(&cleaned)
}

fn parse_layout(value: &Value) -> Result<BTreeMap<String, LayoutSpec>, OverlayError> {
    let mut specs = BTreeMap::new();
    match value {
        Value::Object(map) => {
            for (name, spec) in map {
                if let Some(spec) = spec.as_object() {
                    insert_spec(&mut specs, name, spec);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                let Some(spec) = item.as_object() else { continue };
                let name = spec
                    .get("name")
                    .or_else(|| spec.get("part"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                insert_spec(&mut specs, name, spec);
            }
        }
        _ => {
            return Err(OverlayError::ParseError(
                "layout_specifications must be an object or an array".to_string(),
            ))
        }
    }
    Ok(specs)
}

fn insert_spec(specs: &mut BTreeMap<String, LayoutSpec>, name: &str, spec: &Map<String, Value>) {
    let name = normalize_token(name);
    if name.is_empty() {
        return;
    }
    let field = |key: &str| {
        spec.get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    specs.insert(
        name,
        LayoutSpec {
            position: field("position").or_else(|| field("location")).unwrap_or_default(),
            size: field("size").unwrap_or_default(),
            color: field("color").or_else(|| field("highlight_color")).unwrap_or_default(),
            highlight_method: field("highlight_method"),
            polygon: spec.get("polygon").and_then(parse_points),
            part_type: field("part_type"),
            accessibility: field("accessibility").and_then(|a| AccessibilityTier::parse_lenient(&a)),
        },
    );
}

/// Deterministic planning prompt.
pub fn build_planning_prompt(
    vehicle: &VehicleDescriptor,
    workspace: WorkspaceType,
    repair: &RepairIntent,
) -> String {
    let mut details = Vec::new();
    for (label, value) in [
        ("Engine", &vehicle.engine),
        ("Drivetrain", &vehicle.drivetrain),
        ("Market", &vehicle.market),
        ("Steering", &vehicle.steering),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            details.push(format!("{}: {}", label, value.trim()));
        }
    }
    let details = if details.is_empty() {
        String::new()
    } else {
        format!("\n{}", details.join("\n"))
    };

    format!(
        "Vehicle: {vehicle}{details}\n\
         Workspace: {workspace} ({describe})\n\
         Repair: {repair}\n\
         Target part: {target}\n\n\
         Produce a technical plan for an augmented-reality overlay of this work area.\n\
         Respond with one JSON object with these fields:\n\
         - visual_brief: {{viewpoint, style, contrast, target_part, part_location}}\n\
         - layout_specifications: object keyed by component name; each value has \
         position (top-left, top-center, top-right, center-left, center, center-right, \
         bottom-left, bottom-center, bottom-right), size (small, medium, large), color \
         (hex), optional highlight_method, and accessibility (easy, moderate, difficult)\n\
         - ar_hints: list of rendering hints\n\
         - vehicle_notes: {{engine_layout, accessibility, obstacles, best_viewing_angle}}\n\
         Include the target part in layout_specifications.",
        vehicle = vehicle.display_name(),
        details = details,
        workspace = workspace.as_str(),
        describe = workspace.describe(),
        repair = repair.human(),
        target = repair.target_part().replace('_', " "),
    )
}

/// Planning phase bound to one reasoning provider.
pub struct PlanningPhase {
    provider: Arc<dyn ReasoningProvider>,
    retry: RetryPolicy,
    max_output_tokens: u32,
}

impl PlanningPhase {
    pub fn new(
        provider: Arc<dyn ReasoningProvider>,
        retry: RetryPolicy,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            provider,
            retry,
            max_output_tokens,
        }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub async fn run(
        &self,
        vehicle: &VehicleDescriptor,
        workspace: WorkspaceType,
        repair: &RepairIntent,
    ) -> Result<TechnicalPlan, OverlayError> {
        let start = Instant::now();
        let request = ReasoningRequest::new(
            build_planning_prompt(vehicle, workspace, repair),
            self.max_output_tokens,
        )
        .with_system(PLANNING_SYSTEM_PROMPT);

        let response = retry(&self.retry, "planning", || {
            self.provider.issue(request.clone())
        })
        .await?;

        let value = extract_json_object(&response.text)?;
        let mut plan = TechnicalPlan::from_value(&value)?;
        plan.ensure_target_part(&repair.target_part());

        info!(
            provider = self.provider.provider_name(),
            model = self.provider.model_name(),
            parts = plan.layout_specifications.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Planning phase completed"
        );
        Ok(plan)
    }
}
