//! Property-based tests for keys, geometry and JSON extraction

mod geometry_bounds;
mod key_roundtrip;
