//! Core error types for the document pipeline.
//!
//! Two families live here. [`PipelineError`] is the only error a caller of the
//! pipeline ever sees; it is fatal for the document. The collaborator errors
//! ([`RasterizeError`], [`DetectionError`], [`RecognitionError`]) are produced by
//! the rasterizer, detector and OCR engine, and everything except a rasterizer
//! failure is captured into the [`DocumentResult`](crate::domain::DocumentResult)
//! as a [`FailureKind`] instead of being returned.

use crate::pipeline::PipelineState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while turning input bytes into page images.
#[derive(Debug, Error)]
pub enum RasterizeError {
    /// The backing library could not be loaded or initialized.
    #[error("rasterizer unavailable: {0}")]
    Unavailable(String),

    /// The bytes are not a document the rasterizer understands.
    #[error("failed to load document: {0}")]
    Load(String),

    /// The document loaded but a page could not be rendered.
    #[error("failed to render page {page}: {message}")]
    Render {
        /// 0-based index of the page that failed.
        page: usize,
        /// Message from the rendering backend.
        message: String,
    },

    /// The document has no pages.
    #[error("document has no pages")]
    EmptyDocument,
}

/// Errors raised by a [`RegionDetector`](crate::core::traits::RegionDetector).
#[derive(Debug, Error)]
pub enum DetectionError {
    /// The model cannot process this image (zero size, unsupported color depth, ...).
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    /// The model ran but inference failed.
    #[error("inference failed in model '{model_name}': {message}")]
    Inference {
        /// Name of the model that failed.
        model_name: String,
        /// Additional context.
        message: String,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// The detector was misconfigured.
    #[error("detector configuration: {0}")]
    Config(#[from] crate::core::config::ConfigError),
}

/// Errors raised by a [`TextRecognizer`](crate::core::traits::TextRecognizer).
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The requested language is not in the engine's language set.
    #[error("unsupported language '{language}'")]
    UnsupportedLanguage {
        /// The first unsupported language code in the hint.
        language: String,
    },

    /// The OCR engine is not installed or cannot be started.
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine ran and failed on this image.
    #[error("recognition failed: {0}")]
    Failed(String),

    /// IO error while talking to the engine.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl RecognitionError {
    /// The failure category recorded in the document result.
    pub fn kind(&self) -> FailureKind {
        match self {
            RecognitionError::UnsupportedLanguage { .. } => FailureKind::UnsupportedLanguage,
            _ => FailureKind::RecognitionFailure,
        }
    }

    /// Whether another attempt on the same region could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RecognitionError::UnsupportedLanguage { .. })
    }
}

/// Category of a non-fatal failure captured in a document result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The detector could not process a page. The page contributes no regions.
    DetectionFailure,
    /// OCR failed on a region after all retries. The region is kept with empty text.
    RecognitionFailure,
    /// The language hint is not supported by the OCR engine.
    UnsupportedLanguage,
    /// Work was not issued because the document was cancelled.
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::DetectionFailure => write!(f, "detection failure"),
            FailureKind::RecognitionFailure => write!(f, "recognition failure"),
            FailureKind::UnsupportedLanguage => write!(f, "unsupported language"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How a fatal error should be reported by a request/response layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The input was at fault.
    Client,
    /// The pipeline or its configuration was at fault.
    Server,
}

/// Fatal errors returned by [`DocumentPipeline::process`](crate::pipeline::DocumentPipeline::process).
///
/// Once pages exist the pipeline always produces a result, so the only
/// input-dependent failure is [`PipelineError::UnreadableDocument`].
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input could not be rasterized into at least one page.
    #[error("unreadable document: {message}")]
    UnreadableDocument {
        /// A message describing why the document could not be read.
        message: String,
        /// The underlying rasterizer error.
        #[source]
        source: Option<RasterizeError>,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// The pipeline reached a state it should never reach.
    #[error("internal error while {state}: {message}")]
    Internal {
        /// State the pipeline was in.
        state: PipelineState,
        /// What went wrong.
        message: String,
    },
}

impl From<RasterizeError> for PipelineError {
    fn from(error: RasterizeError) -> Self {
        Self::UnreadableDocument {
            message: error.to_string(),
            source: Some(error),
        }
    }
}

impl From<crate::core::config::ConfigError> for PipelineError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

impl PipelineError {
    /// Creates an unreadable-document error without an underlying source.
    pub fn unreadable(message: impl Into<String>) -> Self {
        Self::UnreadableDocument {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a configuration error with context and details.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use docsift::core::errors::PipelineError;
    /// let err = PipelineError::config_error_detailed(
    ///     "pipeline builder",
    ///     "no text recognizer was provided",
    /// );
    /// assert!(matches!(err, PipelineError::ConfigError { .. }));
    /// ```
    pub fn config_error_detailed(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::ConfigError {
            message: format!("{}: {}", context.into(), details.into()),
        }
    }

    /// Maps the error onto a request/response status family.
    pub fn status_class(&self) -> StatusClass {
        match self {
            PipelineError::UnreadableDocument { .. } => StatusClass::Client,
            PipelineError::ConfigError { .. } | PipelineError::Internal { .. } => {
                StatusClass::Server
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rasterize_error_becomes_unreadable_document() {
        let err: PipelineError = RasterizeError::EmptyDocument.into();
        assert!(matches!(err, PipelineError::UnreadableDocument { .. }));
        assert_eq!(err.status_class(), StatusClass::Client);
        assert!(err.to_string().contains("no pages"));
    }

    #[test]
    fn test_config_error_is_server_side() {
        let err = PipelineError::config_error_detailed("options", "dpi must be positive");
        assert_eq!(err.status_class(), StatusClass::Server);
        assert_eq!(err.to_string(), "configuration: options: dpi must be positive");
    }

    #[test]
    fn test_recognition_error_kinds() {
        let unsupported = RecognitionError::UnsupportedLanguage {
            language: "xyz".to_string(),
        };
        assert_eq!(unsupported.kind(), FailureKind::UnsupportedLanguage);
        assert!(!unsupported.is_retryable());

        let failed = RecognitionError::Failed("blank output".to_string());
        assert_eq!(failed.kind(), FailureKind::RecognitionFailure);
        assert!(failed.is_retryable());
    }

    #[test]
    fn test_failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::DetectionFailure).unwrap();
        assert_eq!(json, "\"detection_failure\"");
    }
}
