//! Utility functions for the document pipeline.
//!
//! This module provides region cropping helpers and logging setup.

pub mod bbox_crop;

pub use bbox_crop::{BBoxCrop, RegionCrop};

/// Initializes the tracing subscriber for logging.
///
/// The filter is read from `RUST_LOG`, e.g. `RUST_LOG=docsift=debug`.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
