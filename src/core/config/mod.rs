//! Configuration for the document pipeline.
//!
//! This module provides configuration types, validation traits, and utilities
//! for managing pipeline configurations.

pub mod errors;
pub mod onnx;
pub mod parallel;
pub mod pipeline;

pub use errors::{ConfigError, ConfigValidator};
pub use onnx::*;
pub use parallel::ParallelPolicy;
pub use pipeline::PipelineOptions;
