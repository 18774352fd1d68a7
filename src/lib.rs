//! Overlay Forge: singleflight-cached AR overlay packs for vehicle repairs.
//!
//! An overlay pack bundles a re-hosted reference image (or a vector stand-in),
//! normalized part polygons, access paths and cutaway layers for one
//! (vehicle family, workspace) pair. Packs are generated once per key by a
//! multi-phase provider pipeline and served from the cache afterwards.

pub mod api;
pub mod assembly;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod hosting;
pub mod key;
pub mod logging;
pub mod orchestrator;
pub mod phases;
pub mod provider;
pub mod resolve;
pub mod retry;
pub mod store;
pub mod types;

pub use api::{OverlayService, OverlayServiceBuilder, PackOrigin, ServedPack};
pub use error::{OverlayError, StorageError};
pub use key::CacheKey;
pub use types::{OverlayPack, RepairIntent, VehicleDescriptor, WorkspaceType};
