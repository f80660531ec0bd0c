//! Layout region detection with a YOLOv8-style ONNX model.
//!
//! The model takes a `[1, 3, S, S]` RGB tensor in `[0, 1]` and returns
//! `[1, 4 + C, N]`: for each of `N` anchors a center-format box followed by
//! `C` class scores, all in input pixels.

use crate::core::config::{ConfigError, ConfigValidator, OrtSessionConfig};
use crate::core::errors::DetectionError;
use crate::core::traits::RegionDetector;
use crate::domain::{Detection, Page, RegionClass};
use crate::processors::BoundingBox;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Class labels of layout models trained on DocLayNet, in model order.
pub const DOCLAYNET_LABELS: [&str; 11] = [
    "caption",
    "footnote",
    "formula",
    "list_item",
    "page_footer",
    "page_header",
    "picture",
    "section_header",
    "table",
    "text",
    "title",
];

/// Configuration for [`YoloRegionDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoloDetectorConfig {
    /// Square model input size in pixels.
    pub input_size: u32,
    /// Candidates below this score are discarded.
    pub confidence_threshold: f32,
    /// IoU above which same-class candidates are suppressed.
    pub nms_iou_threshold: f32,
    /// Upper bound on detections per page.
    pub max_detections: usize,
    /// Model class labels in output order; labels with no region class are ignored.
    pub class_labels: Vec<String>,
    /// ONNX Runtime session settings.
    pub session: OrtSessionConfig,
}

impl Default for YoloDetectorConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_threshold: 0.25,
            nms_iou_threshold: 0.5,
            max_detections: 300,
            class_labels: DOCLAYNET_LABELS.iter().map(|s| s.to_string()).collect(),
            session: OrtSessionConfig::default(),
        }
    }
}

impl YoloDetectorConfig {
    /// Maps each model class index onto a region class.
    pub fn class_map(&self) -> Vec<Option<RegionClass>> {
        self.class_labels
            .iter()
            .map(|label| RegionClass::from_label(label))
            .collect()
    }
}

impl ConfigValidator for YoloDetectorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "input_size must be a positive multiple of 32, got {}",
                    self.input_size
                ),
            });
        }
        self.validate_unit_interval("confidence_threshold", self.confidence_threshold)?;
        self.validate_unit_interval("nms_iou_threshold", self.nms_iou_threshold)?;
        if self.max_detections == 0 {
            return Err(ConfigError::InvalidConfig {
                message: "max_detections must be greater than 0".to_string(),
            });
        }
        if self.class_map().iter().all(Option::is_none) {
            return Err(ConfigError::InvalidConfig {
                message: "no class label maps onto a region class".to_string(),
            });
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// A candidate box before non-maximum suppression.
#[derive(Debug, Clone)]
struct Candidate {
    model_class: usize,
    class: RegionClass,
    bbox: BoundingBox,
    score: f32,
}

/// Region detector backed by an ONNX Runtime session.
///
/// `Session::run` needs exclusive access, so the session sits behind a mutex
/// and concurrent pages take turns on it.
pub struct YoloRegionDetector {
    session: Mutex<Session>,
    config: YoloDetectorConfig,
    class_map: Vec<Option<RegionClass>>,
    model_name: String,
}

impl std::fmt::Debug for YoloRegionDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloRegionDetector")
            .field("model_name", &self.model_name)
            .field("config", &self.config)
            .finish()
    }
}

impl YoloRegionDetector {
    /// Loads a model with the default configuration.
    pub fn from_file(model_path: impl AsRef<Path>) -> Result<Self, DetectionError> {
        Self::new(model_path, YoloDetectorConfig::default())
    }

    /// Loads a model.
    pub fn new(
        model_path: impl AsRef<Path>,
        config: YoloDetectorConfig,
    ) -> Result<Self, DetectionError> {
        let model_path = model_path.as_ref();
        config.validate()?;
        config.validate_model_path(model_path)?;

        info!(path = %model_path.display(), "loading layout model");
        let builder = config.session.apply(Session::builder()?)?;
        let session = builder.commit_from_file(model_path)?;

        let model_name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "layout".to_string());
        let class_map = config.class_map();

        Ok(Self {
            session: Mutex::new(session),
            config,
            class_map,
            model_name,
        })
    }

    pub fn config(&self) -> &YoloDetectorConfig {
        &self.config
    }

    fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let size = self.config.input_size;
        let resized =
            image::imageops::resize(image, size, size, image::imageops::FilterType::Triangle);
        Array4::from_shape_fn((1, 3, size as usize, size as usize), |(_, c, y, x)| {
            f32::from(resized.get_pixel(x as u32, y as u32)[c]) / 255.0
        })
    }

    fn inference_error(&self, message: impl Into<String>) -> DetectionError {
        DetectionError::Inference {
            model_name: self.model_name.clone(),
            message: message.into(),
        }
    }
}

impl RegionDetector for YoloRegionDetector {
    fn detect(&self, page: &Page) -> Result<Vec<Detection>, DetectionError> {
        let (width, height) = page.image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectionError::UnsupportedImage(format!(
                "page {} has zero size ({}x{})",
                page.index, width, height
            )));
        }

        let input = self.preprocess(&page.image);
        let candidates = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| self.inference_error("session mutex poisoned"))?;
            let tensor = TensorRef::from_array_view(input.view())?;
            let outputs = session.run(ort::inputs![tensor])?;
            let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
            let dims: Vec<usize> = shape.as_ref().iter().map(|&d| d.max(0) as usize).collect();
            let decoded = decode_output(
                &dims,
                data,
                &self.class_map,
                self.config.confidence_threshold,
            )
            .map_err(|message| self.inference_error(message))?;
            decoded
        };

        let scale_x = width as f32 / self.config.input_size as f32;
        let scale_y = height as f32 / self.config.input_size as f32;
        let candidates: Vec<Candidate> = candidates
            .into_iter()
            .filter_map(|mut c| {
                c.bbox = c
                    .bbox
                    .scale(scale_x, scale_y)
                    .clamp(width as f32, height as f32);
                (!c.bbox.is_degenerate()).then_some(c)
            })
            .collect();
        let raw = candidates.len();

        let detections: Vec<Detection> =
            non_max_suppression(candidates, self.config.nms_iou_threshold)
                .into_iter()
                .take(self.config.max_detections)
                .map(|c| Detection::new(page.index, c.bbox, c.class, c.score))
                .collect();

        debug!(
            page = page.index,
            candidates = raw,
            detections = detections.len(),
            "layout detection finished"
        );
        Ok(detections)
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// Decodes a `[1, 4 + C, N]` output into candidates in input-pixel coordinates.
fn decode_output(
    dims: &[usize],
    data: &[f32],
    class_map: &[Option<RegionClass>],
    confidence_threshold: f32,
) -> Result<Vec<Candidate>, String> {
    if dims.len() != 3 || dims[0] != 1 {
        return Err(format!("expected output shape [1, 4 + C, N], got {:?}", dims));
    }
    let num_features = dims[1];
    let num_anchors = dims[2];
    if num_features <= 4 {
        return Err(format!("output has no class scores: {:?}", dims));
    }
    if data.len() < num_features * num_anchors {
        return Err(format!(
            "output holds {} values, shape {:?} needs {}",
            data.len(),
            dims,
            num_features * num_anchors
        ));
    }
    let num_classes = (num_features - 4).min(class_map.len());

    let feature = |f: usize, anchor: usize| data[f * num_anchors + anchor];
    let mut candidates = Vec::new();
    for anchor in 0..num_anchors {
        let best = (0..num_classes)
            .map(|c| (c, feature(4 + c, anchor)))
            .filter(|(_, score)| !score.is_nan())
            .max_by(|a, b| a.1.total_cmp(&b.1));
        let Some((model_class, score)) = best else {
            continue;
        };
        if score < confidence_threshold {
            continue;
        }
        let Some(class) = class_map[model_class] else {
            continue;
        };
        candidates.push(Candidate {
            model_class,
            class,
            bbox: BoundingBox::from_center(
                feature(0, anchor),
                feature(1, anchor),
                feature(2, anchor),
                feature(3, anchor),
            ),
            score,
        });
    }
    Ok(candidates)
}

/// Per-class non-maximum suppression; output is sorted by score, highest first.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut keep: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = keep.iter().any(|k| {
            k.model_class == candidate.model_class && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lays anchors out as `[1, 4 + C, N]`.
    fn output(anchors: &[[f32; 6]]) -> (Vec<usize>, Vec<f32>) {
        let n = anchors.len();
        let mut data = vec![0.0; 6 * n];
        for (a, values) in anchors.iter().enumerate() {
            for (f, v) in values.iter().enumerate() {
                data[f * n + a] = *v;
            }
        }
        (vec![1, 6, n], data)
    }

    fn two_class_map() -> Vec<Option<RegionClass>> {
        vec![Some(RegionClass::Text), Some(RegionClass::Table)]
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = YoloDetectorConfig::default();
        assert!(config.validate().is_ok());
        let map = config.class_map();
        assert_eq!(map.len(), 11);
        assert_eq!(map[3], Some(RegionClass::List));
        assert_eq!(map[7], Some(RegionClass::Title));
        assert_eq!(map[9], Some(RegionClass::Text));
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let config = YoloDetectorConfig {
            input_size: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = YoloDetectorConfig {
            class_labels: vec!["seal".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_decode_picks_best_class() {
        let (dims, data) = output(&[
            [50.0, 40.0, 20.0, 10.0, 0.1, 0.8],
            [10.0, 10.0, 4.0, 4.0, 0.6, 0.2],
        ]);
        let candidates = decode_output(&dims, &data, &two_class_map(), 0.25).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].class, RegionClass::Table);
        assert_eq!(candidates[0].bbox, BoundingBox::from_coords(40.0, 35.0, 60.0, 45.0));
        assert_eq!(candidates[1].class, RegionClass::Text);
    }

    #[test]
    fn test_decode_filters_low_scores_and_unmapped_classes() {
        let (dims, data) = output(&[
            [50.0, 40.0, 20.0, 10.0, 0.1, 0.2],
            [10.0, 10.0, 4.0, 4.0, 0.1, 0.9],
        ]);
        let map = vec![Some(RegionClass::Text), None];
        let candidates = decode_output(&dims, &data, &map, 0.25).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_decode_ignores_nan_scores() {
        let (dims, data) = output(&[
            [50.0, 40.0, 20.0, 10.0, f32::NAN, 0.6],
            [10.0, 10.0, 4.0, 4.0, f32::NAN, f32::NAN],
        ]);
        let candidates = decode_output(&dims, &data, &two_class_map(), 0.25).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class, RegionClass::Table);
        assert_eq!(candidates[0].score, 0.6);
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        assert!(decode_output(&[1, 4, 10], &[0.0; 40], &two_class_map(), 0.25).is_err());
        assert!(decode_output(&[1, 6], &[0.0; 6], &two_class_map(), 0.25).is_err());
        assert!(decode_output(&[1, 6, 10], &[0.0; 6], &two_class_map(), 0.25).is_err());
    }

    #[test]
    fn test_nms_is_per_class() {
        let bbox = BoundingBox::from_coords(0.0, 0.0, 10.0, 10.0);
        let shifted = BoundingBox::from_coords(1.0, 0.0, 11.0, 10.0);
        let candidates = vec![
            Candidate {
                model_class: 0,
                class: RegionClass::Text,
                bbox,
                score: 0.7,
            },
            Candidate {
                model_class: 0,
                class: RegionClass::Text,
                bbox: shifted,
                score: 0.9,
            },
            Candidate {
                model_class: 1,
                class: RegionClass::Table,
                bbox,
                score: 0.5,
            },
        ];
        let kept = non_max_suppression(candidates, 0.5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].class, RegionClass::Table);
    }

    #[test]
    fn test_missing_model_is_a_config_error() {
        let result = YoloRegionDetector::from_file("/nonexistent/layout.onnx");
        assert!(matches!(result, Err(DetectionError::Config(_))));
    }
}
