//! # docsift
//!
//! Document region detection fused with OCR.
//!
//! A document (PDF or raster image) is rasterized into pages, a layout
//! detector locates content regions on every page, overlapping detections are
//! reconciled into a reading-ordered set of regions, and every region is run
//! through an OCR engine. The result is a [`DocumentResult`](domain::DocumentResult)
//! with positioned, confidence-annotated text.
//!
//! The pipeline only depends on the [`Rasterizer`](core::traits::Rasterizer),
//! [`RegionDetector`](core::traits::RegionDetector) and
//! [`TextRecognizer`](core::traits::TextRecognizer) traits. The [`adapters`]
//! module provides implementations backed by pdfium, ONNX Runtime and the
//! Tesseract command line.
//!
//! ```rust,no_run
//! use docsift::adapters::{PdfRasterizer, TesseractRecognizer, YoloRegionDetector};
//! use docsift::core::PipelineOptions;
//! use docsift::pipeline::DocumentPipeline;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = DocumentPipeline::builder()
//!     .rasterizer(Arc::new(PdfRasterizer::new()?))
//!     .detector(Arc::new(YoloRegionDetector::from_file("layout.onnx")?))
//!     .recognizer(Arc::new(TesseractRecognizer::new()))
//!     .build()?;
//!
//! let bytes = std::fs::read("statement.pdf")?;
//! let result = pipeline.process(&bytes, &PipelineOptions::default())?;
//! println!("{}", result.full_text());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod core;
pub mod domain;
pub mod pipeline;
pub mod processors;
pub mod utils;
