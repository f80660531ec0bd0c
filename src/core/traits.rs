//! Capability traits for the pipeline's external collaborators.
//!
//! The pipeline depends only on these traits. Concrete implementations live in
//! [`crate::adapters`]; tests substitute scripted mocks.

use crate::core::errors::{DetectionError, RasterizeError, RecognitionError};
use crate::domain::{Detection, LanguageHint, Page, RecognizedText, RegionClass};
use image::RgbImage;

/// Turns raw document bytes into page images.
pub trait Rasterizer: Send + Sync {
    /// Renders every page of the document at `dpi`.
    ///
    /// Pages are returned in document order with consecutive 0-based indices.
    fn rasterize(&self, bytes: &[u8], dpi: f32) -> Result<Vec<Page>, RasterizeError>;
}

/// Locates content regions on a single page.
///
/// Implementations must be safe to call from several pages at once.
pub trait RegionDetector: Send + Sync {
    /// Returns zero or more detections for the page.
    ///
    /// An empty vector means no regions were found. The pipeline overwrites
    /// each detection's page index with `page.index`.
    fn detect(&self, page: &Page) -> Result<Vec<Detection>, DetectionError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "detector"
    }
}

/// Extracts text from a region image.
pub trait TextRecognizer: Send + Sync {
    /// Recognizes the text in `image`.
    ///
    /// Span boxes, if any, are relative to `image`.
    fn recognize(
        &self,
        image: &RgbImage,
        hint: &LanguageHint,
    ) -> Result<RecognizedText, RecognitionError>;

    /// Recognizes a region whose layout class is known.
    ///
    /// Engines with per-class settings override this; by default the class
    /// is ignored.
    fn recognize_class(
        &self,
        image: &RgbImage,
        hint: &LanguageHint,
        _class: RegionClass,
    ) -> Result<RecognizedText, RecognitionError> {
        self.recognize(image, hint)
    }

    /// The languages this engine accepts, or `None` if it accepts any hint.
    fn supported_languages(&self) -> Option<&[String]> {
        None
    }

    /// Upper bound on simultaneous `recognize` calls, or `None` for no limit.
    fn max_concurrency(&self) -> Option<usize> {
        None
    }

    /// Name used in logs.
    fn name(&self) -> &str {
        "recognizer"
    }
}
