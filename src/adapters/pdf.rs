//! Document rasterization with PDFium, plus single-image input.

use crate::core::errors::RasterizeError;
use crate::core::traits::Rasterizer;
use crate::domain::Page;
use image::RgbImage;
use image::imageops::FilterType;
use pdfium_render::prelude::*;
use tracing::debug;

/// Configuration for page rendering
#[derive(Debug, Clone, PartialEq)]
pub struct PdfRenderSettings {
    /// Maximum width or height of a rendered page (default: 4000)
    pub max_dimension: u32,
    /// Render form fields (default: true)
    pub render_form_data: bool,
    /// Render annotations (default: true)
    pub render_annotations: bool,
}

impl Default for PdfRenderSettings {
    fn default() -> Self {
        Self {
            max_dimension: 4000,
            render_form_data: true,
            render_annotations: true,
        }
    }
}

/// Rasterizes PDFs with PDFium and accepts raster images as one-page documents.
///
/// PDFium bindings are not shared between threads; the library is bound for
/// each call, so one rasterizer can serve concurrent documents.
#[derive(Debug, Clone)]
pub struct PdfRasterizer {
    settings: PdfRenderSettings,
}

impl PdfRasterizer {
    /// Creates a rasterizer with default settings.
    ///
    /// Fails if the PDFium library cannot be found.
    pub fn new() -> Result<Self, RasterizeError> {
        Self::with_settings(PdfRenderSettings::default())
    }

    /// Creates a rasterizer with custom settings.
    pub fn with_settings(settings: PdfRenderSettings) -> Result<Self, RasterizeError> {
        bind_pdfium()?;
        Ok(Self { settings })
    }

    /// Creates a rasterizer without checking for PDFium.
    ///
    /// Raster images still work; PDFs fail with
    /// [`RasterizeError::Unavailable`] if the library is missing.
    pub fn images_only(settings: PdfRenderSettings) -> Self {
        Self { settings }
    }

    fn render_pdf(&self, bytes: &[u8], dpi: f32) -> Result<Vec<Page>, RasterizeError> {
        let pdfium = bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| RasterizeError::Load(e.to_string()))?;

        let page_count = document.pages().len() as usize;
        if page_count == 0 {
            return Err(RasterizeError::EmptyDocument);
        }

        let mut pages = Vec::with_capacity(page_count);
        for (index, page) in document.pages().iter().enumerate() {
            let image = self
                .render_page(&page, dpi)
                .map_err(|e| RasterizeError::Render {
                    page: index,
                    message: e.to_string(),
                })?;
            debug!(
                page = index,
                width = image.width(),
                height = image.height(),
                "page rendered"
            );
            pages.push(Page::new(index, image));
        }
        Ok(pages)
    }

    fn render_page(&self, page: &PdfPage, dpi: f32) -> Result<RgbImage, PdfiumError> {
        // 72 points per inch
        let scale = dpi / 72.0;
        let (width_px, height_px) = fit_within(
            (page.width().value * scale) as u32,
            (page.height().value * scale) as u32,
            self.settings.max_dimension,
        );

        let render_config = PdfRenderConfig::new()
            .set_target_width(width_px.max(1) as i32)
            .set_target_height(height_px.max(1) as i32)
            .render_form_data(self.settings.render_form_data)
            .render_annotations(self.settings.render_annotations);

        let bitmap = page.render_with_config(&render_config)?;
        Ok(bitmap.as_image().to_rgb8())
    }

    fn decode_image(&self, bytes: &[u8]) -> Result<Vec<Page>, RasterizeError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| RasterizeError::Load(format!("not a PDF or a supported image: {}", e)))?;

        let (width, height) = fit_within(image.width(), image.height(), self.settings.max_dimension);
        let image = if (width, height) != (image.width(), image.height()) {
            image.resize_exact(width, height, FilterType::Triangle)
        } else {
            image
        };

        let rgb = image.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(RasterizeError::EmptyDocument);
        }
        Ok(vec![Page::new(0, rgb)])
    }
}

impl Rasterizer for PdfRasterizer {
    fn rasterize(&self, bytes: &[u8], dpi: f32) -> Result<Vec<Page>, RasterizeError> {
        if bytes.is_empty() {
            return Err(RasterizeError::Load("empty input".to_string()));
        }
        if is_pdf_bytes(bytes) {
            self.render_pdf(bytes, dpi)
        } else {
            self.decode_image(bytes)
        }
    }
}

fn bind_pdfium() -> Result<Pdfium, RasterizeError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/lib"))
        })
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/local/lib"))
        })
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/homebrew/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| RasterizeError::Unavailable(format!("could not find PDFium library: {}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Scales `(width, height)` down so neither side exceeds `max_dimension`.
fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }
    let ratio = max_dimension as f32 / width.max(height) as f32;
    (
        ((width as f32 * ratio) as u32).max(1),
        ((height as f32 * ratio) as u32).max(1),
    )
}

/// Check if bytes represent a PDF file (magic bytes: %PDF)
pub fn is_pdf_bytes(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}
