//! Upstream collaborators: vehicle classification and workspace resolution.
//!
//! Hosts normally inject their own classifier and resolver. The defaults here
//! are simple enough to run the pipeline end to end from the CLI.

use crate::types::{RepairIntent, VehicleDescriptor, WorkspaceType};

/// Maps a vehicle to the family bucket packs are shared across.
pub trait VehicleClassifier: Send + Sync {
    fn classify(&self, vehicle: &VehicleDescriptor) -> String;
}

/// Maps a repair to the physical area it happens in.
pub trait WorkspaceResolver: Send + Sync {
    fn resolve(&self, repair: &RepairIntent) -> WorkspaceType;
}

/// Family is `<make>_<model>`, lowercase, with every run of
/// non-alphanumerics collapsed to a single `_`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeModelClassifier;

impl VehicleClassifier for MakeModelClassifier {
    fn classify(&self, vehicle: &VehicleDescriptor) -> String {
        slug(&format!("{} {}", vehicle.make, vehicle.model))
    }
}

fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Keyword table checked in order; first hit wins.
const WORKSPACE_KEYWORDS: &[(WorkspaceType, &[&str])] = &[
    (
        WorkspaceType::Interior,
        &["cabin", "dashboard", "seat", "radio", "fuse"],
    ),
    (
        WorkspaceType::TrunkRear,
        &["trunk", "tail_light", "taillight", "spare", "liftgate", "hatch"],
    ),
    (
        WorkspaceType::WheelAssembly,
        &["brake", "rotor", "caliper", "tire", "tyre", "wheel", "hub", "strut"],
    ),
    (
        WorkspaceType::Undercarriage,
        &[
            "exhaust",
            "muffler",
            "oil_drain",
            "drain_plug",
            "transmission",
            "fuel_pump",
            "catalytic",
        ],
    ),
    (
        WorkspaceType::EngineFront,
        &[
            "battery",
            "alternator",
            "belt",
            "spark",
            "radiator",
            "coolant",
            "air_filter",
        ],
    ),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordWorkspaceResolver;

impl WorkspaceResolver for KeywordWorkspaceResolver {
    fn resolve(&self, repair: &RepairIntent) -> WorkspaceType {
        let intent = repair.as_str();
        WORKSPACE_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| intent.contains(k)))
            .map(|(workspace, _)| *workspace)
            .unwrap_or(WorkspaceType::EngineFront)
    }
}
