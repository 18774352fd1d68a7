//! Cache key and pack id computation.
//!
//! The cache key is the human-readable identity of an overlay pack and is used
//! for the lock map and the durable store. The pack id is a digest of the same
//! two fields, embedded in the artifact itself.

use crate::error::OverlayError;
use crate::types::WorkspaceType;
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of digest bytes kept in a pack id.
const PACK_ID_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub vehicle_family: String,
    pub workspace_type: WorkspaceType,
}

impl CacheKey {
    pub fn new(vehicle_family: impl Into<String>, workspace_type: WorkspaceType) -> Self {
        Self {
            vehicle_family: vehicle_family.into(),
            workspace_type,
        }
    }

    /// Pack id for this key.
    pub fn pack_id(&self) -> String {
        pack_id(&self.vehicle_family, self.workspace_type)
    }
}

/// Renders as `<workspace>/<family>`. The workspace never contains `/`, so the
/// first separator always splits the two fields and any family round-trips.
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workspace_type.as_str(), self.vehicle_family)
    }
}

impl FromStr for CacheKey {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (workspace, family) = s
            .split_once('/')
            .ok_or_else(|| OverlayError::ParseError(format!("Malformed cache key: {}", s)))?;
        let workspace_type = workspace
            .parse::<WorkspaceType>()
            .map_err(|_| OverlayError::ParseError(format!("Malformed cache key: {}", s)))?;
        Ok(Self {
            vehicle_family: family.to_string(),
            workspace_type,
        })
    }
}

/// Cache key for a (family, workspace) pair.
pub fn key(vehicle_family: &str, workspace_type: WorkspaceType) -> String {
    CacheKey::new(vehicle_family, workspace_type).to_string()
}

/// Compute the pack id
///
/// PackID = hex(blake3("family:" || len(family) || family || "workspace:" || workspace)[..16])
///
/// The family length is hashed ahead of its bytes so that no two distinct
/// (family, workspace) pairs share an input stream.
pub fn pack_id(vehicle_family: &str, workspace_type: WorkspaceType) -> String {
    let mut hasher = Hasher::new();

    hasher.update(b"family:");
    hasher.update(&(vehicle_family.len() as u64).to_le_bytes());
    hasher.update(vehicle_family.as_bytes());

    hasher.update(b"workspace:");
    hasher.update(workspace_type.as_str().as_bytes());

    hex::encode(&hasher.finalize().as_bytes()[..PACK_ID_BYTES])
}
