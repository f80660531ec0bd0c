//! Configuration types for the CLI.

use docsift::adapters::{
    PdfRasterizer, TesseractConfig, TesseractRecognizer, YoloDetectorConfig, YoloRegionDetector,
};
use docsift::core::config::{OrtExecutionProvider, OrtSessionConfig};
use docsift::core::{ParallelPolicy, PipelineOptions};
use docsift::pipeline::DocumentPipeline;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Configuration for building the pipeline.
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    pub detector_model: PathBuf,
    pub options_file: Option<PathBuf>,
    pub languages: Option<Vec<String>>,
    pub tesseract: PathBuf,
    pub device: String,
    pub page_workers: Option<usize>,
    pub ocr_workers: Option<usize>,
}

impl ProcessConfig {
    /// Reads pipeline options from the options file, if any, and applies
    /// command line overrides.
    pub fn load_options(&self) -> Result<PipelineOptions, Box<dyn std::error::Error + Send + Sync>> {
        let mut options = match &self.options_file {
            Some(path) => {
                info!(path = %path.display(), "loading pipeline options");
                PipelineOptions::from_json(&std::fs::read_to_string(path)?)?
            }
            None => PipelineOptions::default(),
        };
        if let Some(languages) = &self.languages {
            options = options.with_languages(languages.iter().cloned());
        }
        Ok(options)
    }

    /// Builds a pipeline from the pdfium, YOLO and Tesseract adapters.
    pub fn build_pipeline(&self) -> Result<DocumentPipeline, Box<dyn std::error::Error + Send + Sync>> {
        let session = OrtSessionConfig::new()
            .with_execution_providers(vec![parse_device(&self.device)?]);
        let detector = YoloRegionDetector::new(
            &self.detector_model,
            YoloDetectorConfig {
                session,
                ..Default::default()
            },
        )?;

        let recognizer = TesseractRecognizer::with_config(TesseractConfig {
            binary: self.tesseract.clone(),
            ..Default::default()
        })?
        .with_installed_languages()?;

        let pipeline = DocumentPipeline::builder()
            .rasterizer(Arc::new(PdfRasterizer::new()?))
            .detector(Arc::new(detector))
            .recognizer(Arc::new(recognizer))
            .parallel_policy(
                ParallelPolicy::new()
                    .with_page_workers(self.page_workers)
                    .with_ocr_workers(self.ocr_workers),
            )
            .build()?;
        Ok(pipeline)
    }
}

/// Parses a device string (`cpu`, `cuda`, `cuda:1`).
fn parse_device(device: &str) -> Result<OrtExecutionProvider, String> {
    match device.trim().to_ascii_lowercase().as_str() {
        "cpu" => Ok(OrtExecutionProvider::CPU),
        "cuda" => Ok(OrtExecutionProvider::CUDA { device_id: None }),
        other => match other.strip_prefix("cuda:").map(str::parse::<i32>) {
            Some(Ok(id)) => Ok(OrtExecutionProvider::CUDA {
                device_id: Some(id),
            }),
            _ => Err(format!("unknown device '{}'", device)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device() {
        assert_eq!(parse_device("cpu").unwrap(), OrtExecutionProvider::CPU);
        assert_eq!(
            parse_device("CUDA:1").unwrap(),
            OrtExecutionProvider::CUDA { device_id: Some(1) }
        );
        assert!(parse_device("tpu").is_err());
    }
}
