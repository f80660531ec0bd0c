//! Error types for the document pipeline.

mod types;

pub use types::{
    DetectionError, FailureKind, PipelineError, RasterizeError, RecognitionError, StatusClass,
};
