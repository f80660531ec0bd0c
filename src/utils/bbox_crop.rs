//! Bounding box based image cropping utilities.

use crate::core::errors::RecognitionError;
use crate::processors::BoundingBox;
use image::{RgbImage, imageops};

/// A region cut out of a page, with the page position of its top-left pixel.
#[derive(Debug, Clone)]
pub struct RegionCrop {
    pub image: RgbImage,
    pub origin_x: u32,
    pub origin_y: u32,
}

impl RegionCrop {
    /// Maps a box relative to the crop back into page coordinates.
    pub fn to_page(&self, bbox: &BoundingBox) -> BoundingBox {
        bbox.translate(self.origin_x as f32, self.origin_y as f32)
    }
}

/// Bounding box based image cropping utilities.
pub struct BBoxCrop;

impl BBoxCrop {
    /// Crops a padded bounding box out of a page image.
    ///
    /// The box is grown by `padding` pixels on each side, then clamped to the
    /// image. Fractional edges are widened outwards to whole pixels.
    ///
    /// # Arguments
    ///
    /// * `image` - The source image
    /// * `bbox` - The region to crop, in image pixel coordinates
    /// * `padding` - Extra pixels around the region
    ///
    /// # Returns
    ///
    /// The cropped image and its origin, or an error if nothing of the box
    /// lies inside the image.
    pub fn crop_padded(
        image: &RgbImage,
        bbox: &BoundingBox,
        padding: u32,
    ) -> Result<RegionCrop, RecognitionError> {
        let (width, height) = image.dimensions();
        let clamped = bbox
            .pad(padding as f32)
            .clamp(width as f32, height as f32);

        let x1 = clamped.x0.floor() as u32;
        let y1 = clamped.y0.floor() as u32;
        let x2 = (clamped.x1.ceil() as u32).min(width);
        let y2 = (clamped.y1.ceil() as u32).min(height);

        if x2 <= x1 || y2 <= y1 {
            return Err(RecognitionError::Failed(format!(
                "region ({:.1}, {:.1}, {:.1}, {:.1}) lies outside the {}x{} page",
                bbox.x0, bbox.y0, bbox.x1, bbox.y1, width, height
            )));
        }

        Ok(RegionCrop {
            image: imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image(),
            origin_x: x1,
            origin_y: y1,
        })
    }
}
