//! Integration tests for the overlay pack pipeline

mod support;

mod cache_roundtrip;
mod config_integration;
mod fallback;
mod scenario;
mod singleflight;
