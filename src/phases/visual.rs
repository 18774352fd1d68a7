//! Visual generation phase
//!
//! Builds the image prompt from the plan, requests one image, and re-hosts it
//! before its URL goes anywhere near an artifact.

use crate::error::OverlayError;
use crate::hosting::{ImageHost, ImageSource};
use crate::key::CacheKey;
use crate::phases::planning::TechnicalPlan;
use crate::provider::{ImageProvider, ImageRequest};
use crate::retry::{retry, RetryPolicy};
use crate::types::{CanvasSize, RepairIntent, VehicleDescriptor, WorkspaceType};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Which side of the vehicle the target part sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideHint {
    Driver,
    Passenger,
    Front,
    Rear,
    Left,
    Right,
    Center,
}

impl SideHint {
    /// Keyword match on the plan's free-text part location. Driver/passenger
    /// wins over front/rear, which wins over left/right.
    pub fn from_location(location: &str) -> Self {
        let lowered = location.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has = |candidates: &[&str]| words.iter().any(|w| candidates.contains(w));

        if has(&["driver", "drivers"]) {
            SideHint::Driver
        } else if has(&["passenger", "passengers"]) {
            SideHint::Passenger
        } else if has(&["front", "forward"]) {
            SideHint::Front
        } else if has(&["rear", "back"]) {
            SideHint::Rear
        } else if has(&["left"]) {
            SideHint::Left
        } else if has(&["right"]) {
            SideHint::Right
        } else {
            SideHint::Center
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SideHint::Driver => "driver",
            SideHint::Passenger => "passenger",
            SideHint::Front => "front",
            SideHint::Rear => "rear",
            SideHint::Left => "left",
            SideHint::Right => "right",
            SideHint::Center => "center",
        }
    }

    /// Prompt phrase. Driver and passenger resolve to a physical side from
    /// the steering position.
    pub fn describe(&self, vehicle: &VehicleDescriptor) -> String {
        let rhd = vehicle.is_right_hand_drive();
        match self {
            SideHint::Driver => {
                format!("driver side ({})", if rhd { "right" } else { "left" })
            }
            SideHint::Passenger => {
                format!("passenger side ({})", if rhd { "left" } else { "right" })
            }
            SideHint::Center => "center of the work area".to_string(),
            other => format!("{} side", other.as_str()),
        }
    }
}

impl fmt::Display for SideHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant differences worth telling the image model about.
pub fn variant_notes(vehicle: &VehicleDescriptor, plan: &TechnicalPlan) -> Vec<String> {
    let mut notes = Vec::new();
    let mut push = |label: &str, value: &str| {
        let value = value.trim();
        if !value.is_empty() {
            notes.push(format!("{}: {}", label, value));
        }
    };

    push("Engine", vehicle.engine.as_deref().unwrap_or_default());
    push("Trim", vehicle.trim.as_deref().unwrap_or_default());
    push("Drivetrain", vehicle.drivetrain.as_deref().unwrap_or_default());
    push("Market", vehicle.market.as_deref().unwrap_or_default());
    push("Steering", vehicle.steering.as_deref().unwrap_or_default());
    push("Engine layout", &plan.vehicle_notes.engine_layout);
    push("Accessibility", &plan.vehicle_notes.accessibility);
    push("Obstacles", &plan.vehicle_notes.obstacles.join(", "));
    push("Best viewing angle", &plan.vehicle_notes.best_viewing_angle);
    notes
}

/// Deterministic image prompt.
pub fn build_image_prompt(
    vehicle: &VehicleDescriptor,
    repair: &RepairIntent,
    workspace: WorkspaceType,
    target_part: &str,
    side: SideHint,
    notes: &[String],
    plan: &TechnicalPlan,
) -> String {
    let brief = &plan.visual_brief;
    let mut prompt = format!(
        "Technical illustration of a {vehicle}, {workspace}.\n\
         Repair: {repair}. Highlight the {part} on the {side}.",
        vehicle = vehicle.display_name(),
        workspace = workspace.describe(),
        repair = repair.human(),
        part = target_part.replace('_', " "),
        side = side.describe(vehicle),
    );
    for (label, value) in [
        ("Viewpoint", &brief.viewpoint),
        ("Style", &brief.style),
        ("Contrast", &brief.contrast),
    ] {
        if !value.is_empty() {
            prompt.push_str(&format!("\n{}: {}", label, value));
        }
    }
    if !notes.is_empty() {
        prompt.push_str("\nVehicle specifics:");
        for note in notes {
            prompt.push_str("\n- ");
            prompt.push_str(note);
        }
    }
    prompt.push_str("\nNo text, no labels, no watermarks. Clean background, even lighting.");
    prompt
}

/// Durable image reference plus the canvas it was generated at.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualOutput {
    pub image_url: String,
    pub canvas: CanvasSize,
}

pub struct VisualPhase {
    provider: Arc<dyn ImageProvider>,
    host: Arc<dyn ImageHost>,
    retry: RetryPolicy,
    size: String,
    quality: String,
}

impl VisualPhase {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        host: Arc<dyn ImageHost>,
        retry: RetryPolicy,
        size: impl Into<String>,
        quality: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            host,
            retry,
            size: size.into(),
            quality: quality.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub async fn run(
        &self,
        key: &CacheKey,
        vehicle: &VehicleDescriptor,
        repair: &RepairIntent,
        plan: &TechnicalPlan,
    ) -> Result<VisualOutput, OverlayError> {
        let start = Instant::now();
        let side = SideHint::from_location(&plan.visual_brief.part_location);
        let notes = variant_notes(vehicle, plan);
        let prompt = build_image_prompt(
            vehicle,
            repair,
            key.workspace_type,
            &plan.target_part,
            side,
            &notes,
            plan,
        );
        let request = ImageRequest::single(self.provider.model_name(), prompt, &self.size, &self.quality);

        let response = retry(&self.retry, "image", || self.provider.issue(request.clone())).await?;

        let datum = response.data.into_iter().next().ok_or_else(|| {
            OverlayError::GenerationError("image provider returned no images".to_string())
        })?;
        let source = match (datum.url, datum.b64_json) {
            (Some(url), _) if !url.trim().is_empty() => ImageSource::Url(url),
            (_, Some(payload)) if !payload.trim().is_empty() => ImageSource::Base64(payload),
            _ => {
                return Err(OverlayError::GenerationError(
                    "image provider returned an empty image URL".to_string(),
                ))
            }
        };

        let image_url = self.host.rehost(&source, key).await?;
        if image_url.trim().is_empty() {
            return Err(OverlayError::GenerationError(
                "image host returned an empty URL".to_string(),
            ));
        }

        info!(
            key = %key,
            side = side.as_str(),
            model = self.provider.model_name(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Visual generation completed"
        );
        Ok(VisualOutput {
            image_url,
            canvas: CanvasSize::parse(&self.size).unwrap_or_default(),
        })
    }
}
