//! Auxiliary phases: access-path and cutaway-layer synthesis.
//!
//! Both are best-effort. A failed call yields an empty map, and malformed or
//! out-of-range entries are dropped one by one, so the pack stays valid
//! without them.

use crate::error::OverlayError;
use crate::extract::extract_json_object;
use crate::phases::{parse_points, str_field};
use crate::provider::{ReasoningProvider, ReasoningRequest};
use crate::retry::{retry, RetryPolicy};
use crate::types::{
    normalize_token, AccessPath, AccessibilityTier, NormalizedCoordinate, OverlayLayer,
    OverlayPart, VehicleDescriptor, WorkspaceType,
};
use futures::future::join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const MIN_WAYPOINTS: usize = 2;
const MAX_WAYPOINTS: usize = 4;
const MIN_LAYER_POINTS: usize = 3;

const DEFAULT_DURATION_MS: u32 = 1500;
const DEFAULT_STROKE_WIDTH: f32 = 4.0;
const DEFAULT_DASH: [f32; 2] = [8.0, 4.0];
const DEFAULT_TINT: &str = "#3A7BD5";
const DEFAULT_OPACITY: f32 = 0.45;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxiliaryOutput {
    pub access_paths: BTreeMap<String, AccessPath>,
    pub layers: BTreeMap<String, OverlayLayer>,
}

pub struct AuxiliaryPhases {
    provider: Arc<dyn ReasoningProvider>,
    retry: RetryPolicy,
    max_output_tokens: u32,
}

impl AuxiliaryPhases {
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

    /// Run both phases concurrently; both settle before this returns.
    pub async fn run(
        &self,
        vehicle: &VehicleDescriptor,
        workspace: WorkspaceType,
        parts: &BTreeMap<String, OverlayPart>,
    ) -> AuxiliaryOutput {
        let start = Instant::now();
        let (access_paths, layers) = tokio::join!(
            self.access_paths(vehicle, workspace, parts),
            self.cutaway_layers(vehicle, workspace, parts),
        );
        info!(
            access_paths = access_paths.len(),
            layers = layers.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Auxiliary phases completed"
        );
        AuxiliaryOutput {
            access_paths,
            layers,
        }
    }

    /// One request per difficult part, issued concurrently.
    pub async fn access_paths(
        &self,
        vehicle: &VehicleDescriptor,
        workspace: WorkspaceType,
        parts: &BTreeMap<String, OverlayPart>,
    ) -> BTreeMap<String, AccessPath> {
        let difficult: Vec<(&String, &OverlayPart)> = parts
            .iter()
            .filter(|(_, part)| part.accessibility == AccessibilityTier::Difficult)
            .collect();
        if difficult.is_empty() {
            return BTreeMap::new();
        }

        let requests = difficult.into_iter().map(|(name, part)| async move {
            let result = self.access_path_for(vehicle, workspace, name, part).await;
            (name, result)
        });

        let mut paths = BTreeMap::new();
        for (name, result) in join_all(requests).await {
            match result {
                Ok(Some(path)) => {
                    paths.insert(name.clone(), path);
                }
                Ok(None) => debug!(part = %name, "Discarded malformed access path"),
                Err(err) => warn!(part = %name, error = %err, "Access path synthesis failed"),
            }
        }
        paths
    }

    async fn access_path_for(
        &self,
        vehicle: &VehicleDescriptor,
        workspace: WorkspaceType,
        name: &str,
        part: &OverlayPart,
    ) -> Result<Option<AccessPath>, OverlayError> {
        let (cx, cy) = centroid(&part.polygon);
        let prompt = format!(
            "Vehicle: {vehicle}\nWorkspace: {workspace}\nPart: {part} (difficult to reach), \
             centered near ({cx:.2}, {cy:.2}) in normalized image coordinates.\n\n\
             Describe the approach route a technician's hand or tool should follow to reach \
             the part. Respond with one JSON object: {{\"waypoints\": [[x, y], ...] \
             (2 to 4 points, each coordinate between 0 and 1, ending at the part), \
             \"duration_ms\": animation length, \"stroke_width\": pixels, \
             \"dash_pattern\": [on, off]}}.",
            vehicle = vehicle.display_name(),
            workspace = workspace.describe(),
            part = name.replace('_', " "),
            cx = cx,
            cy = cy,
        );
        let value = self.issue_json("access_path", prompt).await?;
        Ok(parse_access_path(&value))
    }

    /// Single request for the workspace's removable obstructions.
    pub async fn cutaway_layers(
        &self,
        vehicle: &VehicleDescriptor,
        workspace: WorkspaceType,
        parts: &BTreeMap<String, OverlayPart>,
    ) -> BTreeMap<String, OverlayLayer> {
        let part_names: Vec<String> = parts.keys().map(|k| k.replace('_', " ")).collect();
        let prompt = format!(
            "Vehicle: {vehicle}\nWorkspace: {workspace}\nParts of interest: {parts}\n\n\
             List the covers, shrouds or other obstructions a technician removes to work \
             here. Respond with one JSON object: {{\"layers\": [{{\"label\": name, \
             \"polygon\": [[x, y], ...] (at least 3 points, coordinates between 0 and 1), \
             \"tint_color\": hex, \"cutaway_opacity\": 0 to 1}}]}}.",
            vehicle = vehicle.display_name(),
            workspace = workspace.describe(),
            parts = part_names.join(", "),
        );
        match self.issue_json("cutaway_layers", prompt).await {
            Ok(value) => parse_layers(&value),
            Err(err) => {
                warn!(error = %err, "Cutaway layer synthesis failed");
                BTreeMap::new()
            }
        }
    }

    async fn issue_json(&self, operation: &str, prompt: String) -> Result<Value, OverlayError> {
        let request = ReasoningRequest::new(prompt, self.max_output_tokens);
        let response = retry(&self.retry, operation, || self.provider.issue(request.clone())).await?;
        extract_json_object(&response.text)
    }
}

fn centroid(points: &[NormalizedCoordinate]) -> (f64, f64) {
    if points.is_empty() {
        return (0.5, 0.5);
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    (sx / n, sy / n)
}

fn all_normalized(points: &[NormalizedCoordinate]) -> bool {
    points.iter().all(|p| p.is_normalized())
}

fn f32_field(value: &Value, field: &str) -> Option<f32> {
    value
        .get(field)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .map(|v| v as f32)
}

fn parse_access_path(value: &Value) -> Option<AccessPath> {
    let waypoints = parse_points(value.get("waypoints")?)?;
    if !(MIN_WAYPOINTS..=MAX_WAYPOINTS).contains(&waypoints.len()) || !all_normalized(&waypoints) {
        return None;
    }
    let dash_pattern = value
        .get("dash_pattern")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_f64)
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as f32)
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|| DEFAULT_DASH.to_vec());
    Some(AccessPath {
        waypoints,
        duration_ms: value
            .get("duration_ms")
            .and_then(Value::as_u64)
            .map(|d| d.min(u32::MAX as u64) as u32)
            .unwrap_or(DEFAULT_DURATION_MS),
        stroke_width: f32_field(value, "stroke_width")
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_STROKE_WIDTH),
        dash_pattern,
    })
}

fn parse_layers(value: &Value) -> BTreeMap<String, OverlayLayer> {
    let entries: Vec<(String, &Value)> = match value.get("layers") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                let label = first_label(item);
                (label, item)
            })
            .collect(),
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        _ => Vec::new(),
    };

    let mut layers = BTreeMap::new();
    for (label, entry) in entries {
        let name = normalize_token(&label);
        if name.is_empty() {
            continue;
        }
        let Some(polygon) = entry.get("polygon").and_then(parse_points) else {
            debug!(layer = %name, "Discarded layer without polygon");
            continue;
        };
        if polygon.len() < MIN_LAYER_POINTS || !all_normalized(&polygon) {
            debug!(layer = %name, points = polygon.len(), "Discarded invalid layer polygon");
            continue;
        }
        let tint = str_field(entry, "tint_color");
        layers.insert(
            name,
            OverlayLayer {
                polygon,
                tint_color: if tint.is_empty() { DEFAULT_TINT.to_string() } else { tint },
                cutaway_opacity: f32_field(entry, "cutaway_opacity")
                    .map(|o| o.clamp(0.0, 1.0))
                    .unwrap_or(DEFAULT_OPACITY),
                label: label.trim().to_string(),
            },
        );
    }
    layers
}

fn first_label(item: &Value) -> String {
    for field in ["label", "name"] {
        let value = str_field(item, field);
        if !value.is_empty() {
            return value;
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_access_path_waypoint_bounds() {
        let ok = json!({"waypoints": [[0.1, 0.9], [0.4, 0.5], [0.6, 0.4]], "duration_ms": 2000});
        let path = parse_access_path(&ok).unwrap();
        assert_eq!(path.waypoints.len(), 3);
        assert_eq!(path.duration_ms, 2000);
        assert_eq!(path.dash_pattern, DEFAULT_DASH.to_vec());

        let too_short = json!({"waypoints": [[0.1, 0.9]]});
        assert!(parse_access_path(&too_short).is_none());

        let too_long = json!({"waypoints": [[0.1, 0.1], [0.2, 0.2], [0.3, 0.3], [0.4, 0.4], [0.5, 0.5]]});
        assert!(parse_access_path(&too_long).is_none());

        let out_of_range = json!({"waypoints": [[0.1, 0.1], [1.3, 0.2]]});
        assert!(parse_access_path(&out_of_range).is_none());
    }

    #[test]
    fn test_layers_drop_invalid_entries() {
        let value = json!({
            "layers": [
                {"label": "Engine Cover", "polygon": [[0.2, 0.2], [0.8, 0.2], [0.8, 0.6]], "cutaway_opacity": 1.7},
                {"label": "Intake Duct", "polygon": [[0.1, 0.1], [0.2, 0.1]]},
                {"label": "Fuse Box Lid", "polygon": [[0.1, 0.1], [1.1, 0.1], [0.5, 0.5]]},
                {"polygon": [[0.1, 0.1], [0.2, 0.1], [0.2, 0.2]]}
            ]
        });
        let layers = parse_layers(&value);
        assert_eq!(layers.len(), 1);
        let cover = &layers["engine_cover"];
        assert_eq!(cover.label, "Engine Cover");
        assert_eq!(cover.cutaway_opacity, 1.0);
        assert_eq!(cover.tint_color, DEFAULT_TINT);
    }

    #[test]
    fn test_layers_keyed_object() {
        let value = json!({
            "layers": {
                "splash shield": {"polygon": [[0.0, 0.7], [1.0, 0.7], [1.0, 1.0], [0.0, 1.0]], "tint_color": "#222222"}
            }
        });
        let layers = parse_layers(&value);
        assert_eq!(layers["splash_shield"].tint_color, "#222222");
    }

    #[test]
    fn test_centroid() {
        let square = vec![
            NormalizedCoordinate::new(0.0, 0.0),
            NormalizedCoordinate::new(1.0, 0.0),
            NormalizedCoordinate::new(1.0, 1.0),
            NormalizedCoordinate::new(0.0, 1.0),
        ];
        assert_eq!(centroid(&square), (0.5, 0.5));
        assert_eq!(centroid(&[]), (0.5, 0.5));
    }
}
