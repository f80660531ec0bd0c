//! Documents and their rasterized pages.

use image::RgbImage;
use std::sync::Arc;

/// A single rasterized page.
///
/// The image is shared read-only between the detector and every OCR crop, so
/// cloning a `Page` is cheap.
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based page index within the document.
    pub index: usize,
    /// Rendered page pixels.
    pub image: Arc<RgbImage>,
}

impl Page {
    /// Creates a page from an owned image.
    pub fn new(index: usize, image: RgbImage) -> Self {
        Self {
            index,
            image: Arc::new(image),
        }
    }

    /// Page width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Page height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// A rasterized document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Identifier of this run, used in logs and in the result.
    pub id: String,
    /// Pages in document order.
    pub pages: Vec<Page>,
}

impl Document {
    /// Wraps rasterized pages under a fresh document id.
    pub fn new(pages: Vec<Page>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), pages)
    }

    /// Wraps rasterized pages under a known document id.
    pub fn with_id(id: impl Into<String>, pages: Vec<Page>) -> Self {
        Self {
            id: id.into(),
            pages,
        }
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_ids_are_unique() {
        let a = Document::new(vec![Page::new(0, RgbImage::new(4, 4))]);
        let b = Document::new(Vec::new());
        assert_ne!(a.id, b.id);
        assert_eq!(a.page_count(), 1);
        assert_eq!(a.pages[0].width(), 4);
    }
}
