//! Domain types flowing through the document pipeline.
//!
//! Pages come out of a [`Rasterizer`](crate::core::traits::Rasterizer),
//! detections out of a [`RegionDetector`](crate::core::traits::RegionDetector),
//! regions out of the reconciler and text out of a
//! [`TextRecognizer`](crate::core::traits::TextRecognizer). A
//! [`DocumentResult`] ties them together.

pub mod detection;
pub mod document;
pub mod region;
pub mod result;
pub mod text;

pub use detection::{Detection, RegionClass};
pub use document::{Document, Page};
pub use region::{Region, RegionId};
pub use result::{DocumentResult, DocumentStatus, PipelineFailure, RegionResult};
pub use text::{LanguageHint, RecognizedText, TextSpan};
