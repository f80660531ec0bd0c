//! Concrete collaborators for the pipeline.
//!
//! - [`PdfRasterizer`] renders PDFs through pdfium and decodes raster images.
//! - [`YoloRegionDetector`] runs a YOLO-style layout model with ONNX Runtime.
//! - [`TesseractRecognizer`] runs the Tesseract command line on region crops.

pub mod pdf;
pub mod tesseract;
pub mod yolo;

pub use pdf::{PdfRasterizer, PdfRenderSettings, is_pdf_bytes};
pub use tesseract::{SegmentationMode, TesseractConfig, TesseractRecognizer};
pub use yolo::{DOCLAYNET_LABELS, YoloDetectorConfig, YoloRegionDetector};
