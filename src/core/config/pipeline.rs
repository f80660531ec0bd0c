//! Per-document pipeline options.

use super::errors::{ConfigError, ConfigValidator};
use crate::domain::{LanguageHint, RegionClass};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound on OCR retries per region.
const MAX_OCR_RETRIES: u32 = 10;

/// Options threaded through one call to
/// [`DocumentPipeline::process`](crate::pipeline::DocumentPipeline::process).
///
/// The value is immutable for the duration of a run, so concurrent documents
/// never share mutable configuration. Every field has a default, and missing
/// fields fall back to it when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Rasterization resolution in dots per inch.
    pub dpi: f32,
    /// IoU at or above which two detections on a page are merged.
    pub iou_threshold: f32,
    /// Detections below this confidence are discarded before reconciliation.
    pub min_confidence: f32,
    /// Ordered OCR language hints (engine language codes such as `eng`).
    pub languages: Vec<String>,
    /// Extra OCR attempts for a region whose recognition failed.
    pub max_ocr_retries: u32,
    /// Height in pixels of the row bands used for reading order.
    pub row_band_height: f32,
    /// Pixels added around each region before cropping it for OCR.
    pub crop_padding: u32,
    /// Per-class padding that replaces `crop_padding` for those classes.
    pub class_crop_padding: BTreeMap<RegionClass, u32>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            dpi: 200.0,
            iou_threshold: 0.5,
            min_confidence: 0.25,
            languages: vec!["eng".to_string(), "fra".to_string()],
            max_ocr_retries: 1,
            row_band_height: 32.0,
            crop_padding: 8,
            class_crop_padding: BTreeMap::new(),
        }
    }
}

impl PipelineOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rasterization DPI.
    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Sets the merge IoU threshold.
    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Sets the detection confidence floor.
    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.min_confidence = confidence;
        self
    }

    /// Sets the ordered OCR language hints.
    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the number of OCR retries per region.
    pub fn with_max_ocr_retries(mut self, retries: u32) -> Self {
        self.max_ocr_retries = retries;
        self
    }

    /// Sets the reading-order row band height.
    pub fn with_row_band_height(mut self, height: f32) -> Self {
        self.row_band_height = height;
        self
    }

    /// Sets the crop padding.
    pub fn with_crop_padding(mut self, padding: u32) -> Self {
        self.crop_padding = padding;
        self
    }

    /// Sets the crop padding for one region class.
    pub fn with_class_crop_padding(mut self, class: RegionClass, padding: u32) -> Self {
        self.class_crop_padding.insert(class, padding);
        self
    }

    /// Crop padding for a region of `class`.
    pub fn crop_padding_for(&self, class: RegionClass) -> u32 {
        self.class_crop_padding
            .get(&class)
            .copied()
            .unwrap_or(self.crop_padding)
    }

    /// The language hint handed to the OCR engine.
    pub fn language_hint(&self) -> LanguageHint {
        LanguageHint::new(self.languages.iter().cloned())
    }

    /// Loads options from a JSON document; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_str(json).map_err(|e| ConfigError::InvalidConfig {
            message: format!("failed to parse pipeline options: {}", e),
        })?;
        options.validate()?;
        Ok(options)
    }
}

impl ConfigValidator for PipelineOptions {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_positive("dpi", self.dpi)?;
        self.validate_unit_interval("iou_threshold", self.iou_threshold)?;
        if self.iou_threshold == 0.0 {
            return Err(ConfigError::InvalidConfig {
                message: "iou_threshold must be greater than 0.0".to_string(),
            });
        }
        self.validate_unit_interval("min_confidence", self.min_confidence)?;
        self.validate_positive("row_band_height", self.row_band_height)?;

        if self.languages.is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "at least one OCR language must be configured".to_string(),
            });
        }
        if let Some(bad) = self
            .languages
            .iter()
            .find(|l| l.trim().is_empty() || l.contains('+'))
        {
            return Err(ConfigError::InvalidConfig {
                message: format!("invalid OCR language code '{}'", bad),
            });
        }

        if self.max_ocr_retries > MAX_OCR_RETRIES {
            return Err(ConfigError::ResourceLimitExceeded {
                message: format!(
                    "max_ocr_retries {} exceeds the limit of {}",
                    self.max_ocr_retries, MAX_OCR_RETRIES
                ),
            });
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}
