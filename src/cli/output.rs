//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::OverlayError;

/// `error[<kind>]: <message>`, where kind is the stable short name.
pub fn map_error(e: &OverlayError) -> String {
    format!("error[{}]: {}", e.kind(), e)
}
