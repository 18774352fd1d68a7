//! Geometry validation for assembled packs.
//!
//! Every polygon and polyline in a candidate pack must lie inside the unit
//! square. Out-of-range points are rejected, never clamped: one bad point
//! rejects the whole pack.

use crate::error::OverlayError;
use crate::types::{NormalizedCoordinate, OverlayPack, PackVisual};
use std::fmt;

/// Reported violations are capped in the error message.
const MAX_REPORTED_VIOLATIONS: usize = 5;

const MIN_POLYGON_POINTS: usize = 3;
const MIN_POLYLINE_POINTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum GeometryViolation {
    OutOfRange {
        element: String,
        index: usize,
        point: NormalizedCoordinate,
    },
    NotFinite {
        element: String,
        index: usize,
    },
    TooFewPoints {
        element: String,
        found: usize,
        required: usize,
    },
}

impl fmt::Display for GeometryViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryViolation::OutOfRange {
                element,
                index,
                point,
            } => write!(
                f,
                "{} point {} = ({}, {}) outside [0,1]",
                element, index, point.x, point.y
            ),
            GeometryViolation::NotFinite { element, index } => {
                write!(f, "{} point {} is not finite", element, index)
            }
            GeometryViolation::TooFewPoints {
                element,
                found,
                required,
            } => write!(
                f,
                "{} has {} points, at least {} required",
                element, found, required
            ),
        }
    }
}

fn check_points(
    element: String,
    points: &[NormalizedCoordinate],
    min_points: usize,
    out: &mut Vec<GeometryViolation>,
) {
    if points.len() < min_points {
        out.push(GeometryViolation::TooFewPoints {
            element: element.clone(),
            found: points.len(),
            required: min_points,
        });
    }
    for (index, point) in points.iter().enumerate() {
        if !point.x.is_finite() || !point.y.is_finite() {
            out.push(GeometryViolation::NotFinite {
                element: element.clone(),
                index,
            });
        } else if !point.is_normalized() {
            out.push(GeometryViolation::OutOfRange {
                element: element.clone(),
                index,
                point: *point,
            });
        }
    }
}

/// Collect every geometry violation in a pack.
pub fn find_violations(pack: &OverlayPack) -> Vec<GeometryViolation> {
    let mut violations = Vec::new();

    for (name, part) in &pack.parts {
        check_points(
            format!("part '{}'", name),
            &part.polygon,
            MIN_POLYGON_POINTS,
            &mut violations,
        );
    }
    for (name, path) in &pack.access_paths {
        check_points(
            format!("access path '{}'", name),
            &path.waypoints,
            MIN_POLYLINE_POINTS,
            &mut violations,
        );
    }
    for (name, layer) in &pack.layers {
        check_points(
            format!("layer '{}'", name),
            &layer.polygon,
            MIN_POLYGON_POINTS,
            &mut violations,
        );
    }
    if let PackVisual::VectorScene(scene) = &pack.visual {
        for shape in &scene.shapes {
            check_points(
                format!("vector shape '{}'", shape.label),
                &shape.polygon,
                MIN_POLYGON_POINTS,
                &mut violations,
            );
        }
    }

    violations
}

/// Reject the pack if any coordinate leaves the unit square.
pub fn validate_pack(pack: &OverlayPack) -> Result<(), OverlayError> {
    let violations = find_violations(pack);
    if violations.is_empty() {
        return Ok(());
    }

    let mut message = format!(
        "pack {} has {} geometry violation(s): ",
        pack.id,
        violations.len()
    );
    let shown: Vec<String> = violations
        .iter()
        .take(MAX_REPORTED_VIOLATIONS)
        .map(|v| v.to_string())
        .collect();
    message.push_str(&shown.join("; "));
    if violations.len() > MAX_REPORTED_VIOLATIONS {
        message.push_str("; ...");
    }
    Err(OverlayError::ValidationError(message))
}
