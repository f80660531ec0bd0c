//! The core module of the document pipeline.
//!
//! This module contains the fundamental components shared by every stage:
//! - Configuration management
//! - Error handling
//! - Traits for the rasterizer, detector and OCR engine

pub mod config;
pub mod errors;
pub mod traits;

pub use config::{ConfigError, ConfigValidator, ParallelPolicy, PipelineOptions};
pub use errors::{
    DetectionError, FailureKind, PipelineError, RasterizeError, RecognitionError, StatusClass,
};
pub use traits::{Rasterizer, RegionDetector, TextRecognizer};
