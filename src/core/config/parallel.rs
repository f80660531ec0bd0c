//! Worker pool configuration for page detection and region OCR.

use super::errors::{ConfigError, ConfigValidator};
use serde::{Deserialize, Serialize};

/// Parallelism settings for a [`DocumentPipeline`](crate::pipeline::DocumentPipeline).
///
/// Page detection and region OCR run on separate rayon pools, so a slow OCR
/// engine never starves detection of the next document and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelPolicy {
    /// Threads used to detect and reconcile pages.
    /// If None, the number of available CPU cores is used.
    #[serde(default)]
    pub page_workers: Option<usize>,

    /// Threads used to run OCR on regions.
    /// Capped by the recognizer's own concurrency limit.
    #[serde(default)]
    pub ocr_workers: Option<usize>,
}

impl ParallelPolicy {
    /// Create a new ParallelPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of page workers.
    pub fn with_page_workers(mut self, workers: Option<usize>) -> Self {
        self.page_workers = workers;
        self
    }

    /// Set the number of OCR workers.
    pub fn with_ocr_workers(mut self, workers: Option<usize>) -> Self {
        self.ocr_workers = workers;
        self
    }

    /// Effective page worker count.
    pub fn effective_page_workers(&self) -> usize {
        self.page_workers.unwrap_or_else(available_cores)
    }

    /// Effective OCR worker count given the recognizer's concurrency limit.
    pub fn effective_ocr_workers(&self, engine_limit: usize) -> usize {
        self.ocr_workers
            .unwrap_or_else(available_cores)
            .min(engine_limit)
            .max(1)
    }

    /// Builds the pool used for page detection.
    pub fn build_page_pool(&self) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.effective_page_workers())
            .thread_name(|i| format!("docsift-page-{}", i))
            .build()
    }

    /// Builds the pool used for region OCR.
    pub fn build_ocr_pool(
        &self,
        engine_limit: usize,
    ) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.effective_ocr_workers(engine_limit))
            .thread_name(|i| format!("docsift-ocr-{}", i))
            .build()
    }
}

impl ConfigValidator for ParallelPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_worker_count("page_workers", self.page_workers)?;
        self.validate_worker_count("ocr_workers", self.ocr_workers)
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
