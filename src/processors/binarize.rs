//! OCR crop preprocessing.

use image::{GrayImage, RgbImage};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};

/// Converts a crop to grayscale and binarizes it at its Otsu level.
///
/// Text comes out black on white for typical scans, which is what OCR
/// engines expect.
pub fn binarize_for_ocr(image: &RgbImage) -> GrayImage {
    let gray = image::imageops::grayscale(image);
    let level = otsu_level(&gray);
    threshold(&gray, level, ThresholdType::Binary)
}
