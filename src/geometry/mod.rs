//! Geometry synthesis
//!
//! Turns the qualitative layout labels produced by the planning phase into
//! normalized polygons. No provider is involved: the same labels always yield
//! the same rectangle.

pub mod validate;

pub use validate::{find_violations, validate_pack, GeometryViolation};

use crate::types::{normalize_token, NormalizedCoordinate};
use serde::{Deserialize, Serialize};

/// One of the nine canonical anchor positions on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionLabel {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl PositionLabel {
    pub const ALL: [PositionLabel; 9] = [
        PositionLabel::TopLeft,
        PositionLabel::TopCenter,
        PositionLabel::TopRight,
        PositionLabel::CenterLeft,
        PositionLabel::Center,
        PositionLabel::CenterRight,
        PositionLabel::BottomLeft,
        PositionLabel::BottomCenter,
        PositionLabel::BottomRight,
    ];

    /// Parse a provider label. Accepts separators `-`, `_` and spaces,
    /// `upper`/`lower`/`middle` synonyms, and bare edges (`top` → top-center).
    pub fn parse(raw: &str) -> Option<Self> {
        let token = normalize_token(raw);
        let mut vertical = None;
        let mut horizontal = None;
        for word in token.split('_') {
            match word {
                "top" | "upper" => vertical = Some(0u8),
                "bottom" | "lower" => vertical = Some(2),
                "left" => horizontal = Some(0u8),
                "right" => horizontal = Some(2),
                "center" | "centre" | "middle" | "mid" => {
                    // "center" fills whichever axis is still unset.
                    if vertical.is_none() {
                        vertical = Some(1);
                    } else if horizontal.is_none() {
                        horizontal = Some(1);
                    }
                }
                _ => {}
            }
        }
        if vertical.is_none() && horizontal.is_none() {
            return None;
        }
        let row = vertical.unwrap_or(1);
        let col = horizontal.unwrap_or(1);
        Some(Self::ALL[(row * 3 + col) as usize])
    }

    /// Unknown labels land in the center of the canvas.
    pub fn parse_or_default(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(PositionLabel::Center)
    }

    pub fn anchor(&self) -> (f64, f64) {
        let index = Self::ALL
            .iter()
            .position(|p| p == self)
            .unwrap_or(4);
        let col = index % 3;
        let row = index / 3;
        (AXIS_ANCHORS[col], AXIS_ANCHORS[row])
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionLabel::TopLeft => "top-left",
            PositionLabel::TopCenter => "top-center",
            PositionLabel::TopRight => "top-right",
            PositionLabel::CenterLeft => "center-left",
            PositionLabel::Center => "center",
            PositionLabel::CenterRight => "center-right",
            PositionLabel::BottomLeft => "bottom-left",
            PositionLabel::BottomCenter => "bottom-center",
            PositionLabel::BottomRight => "bottom-right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeLabel {
    Small,
    Medium,
    Large,
}

impl SizeLabel {
    pub const ALL: [SizeLabel; 3] = [SizeLabel::Small, SizeLabel::Medium, SizeLabel::Large];

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "small" | "s" | "tiny" | "compact" => Some(SizeLabel::Small),
            "medium" | "m" | "mid" | "moderate" | "average" => Some(SizeLabel::Medium),
            "large" | "l" | "big" | "wide" => Some(SizeLabel::Large),
            _ => None,
        }
    }

    pub fn parse_or_default(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(SizeLabel::Medium)
    }

    /// Half-extent of the rectangle on each axis.
    pub fn half_extent(&self) -> f64 {
        match self {
            SizeLabel::Small => 0.08,
            SizeLabel::Medium => 0.14,
            SizeLabel::Large => 0.22,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeLabel::Small => "small",
            SizeLabel::Medium => "medium",
            SizeLabel::Large => "large",
        }
    }
}

/// Anchor coordinate for column/row index 0, 1, 2.
const AXIS_ANCHORS: [f64; 3] = [0.2, 0.5, 0.8];

/// Synthesize the 4-point rectangle for a position/size pair.
///
/// Points run clockwise from the top-left corner; every coordinate is clamped
/// to [0, 1].
pub fn synthesize_rectangle(position: PositionLabel, size: SizeLabel) -> Vec<NormalizedCoordinate> {
    let (ax, ay) = position.anchor();
    let h = size.half_extent();
    let left = clamp_unit(ax - h);
    let right = clamp_unit(ax + h);
    let top = clamp_unit(ay - h);
    let bottom = clamp_unit(ay + h);
    vec![
        NormalizedCoordinate::new(left, top),
        NormalizedCoordinate::new(right, top),
        NormalizedCoordinate::new(right, bottom),
        NormalizedCoordinate::new(left, bottom),
    ]
}

/// Same as [`synthesize_rectangle`] from raw provider labels.
pub fn synthesize_from_labels(position: &str, size: &str) -> Vec<NormalizedCoordinate> {
    synthesize_rectangle(
        PositionLabel::parse_or_default(position),
        SizeLabel::parse_or_default(size),
    )
}

fn clamp_unit(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}
