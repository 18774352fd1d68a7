//! Provider-backed pipeline phases.
//!
//! Planning and visual generation feed the fallback chain; the auxiliary
//! phases are best-effort and never fail a pack.

pub mod auxiliary;
pub mod planning;
pub mod visual;

pub use auxiliary::{AuxiliaryOutput, AuxiliaryPhases};
pub use planning::{LayoutSpec, PlanningPhase, TechnicalPlan, VehicleNotes, VisualBrief};
pub use visual::{build_image_prompt, variant_notes, SideHint, VisualOutput, VisualPhase};

use crate::types::NormalizedCoordinate;
use serde_json::Value;

/// Read a point list from provider JSON. Accepts `[x, y]` pairs and
/// `{"x": .., "y": ..}` objects. Values are taken as given, never clamped.
pub(crate) fn parse_points(value: &Value) -> Option<Vec<NormalizedCoordinate>> {
    let items = value.as_array()?;
    items.iter().map(parse_point).collect()
}

fn parse_point(value: &Value) -> Option<NormalizedCoordinate> {
    match value {
        Value::Array(pair) if pair.len() == 2 => Some(NormalizedCoordinate::new(
            pair[0].as_f64()?,
            pair[1].as_f64()?,
        )),
        Value::Object(map) => Some(NormalizedCoordinate::new(
            map.get("x")?.as_f64()?,
            map.get("y")?.as_f64()?,
        )),
        _ => None,
    }
}

/// String field or empty.
pub(crate) fn str_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// A field that providers return either as one string or a list of strings.
pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some(format!("{}: {}", k, s.trim())),
                Value::Bool(b) => Some(format!("{}: {}", k, b)),
                Value::Number(n) => Some(format!("{}: {}", k, n)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
