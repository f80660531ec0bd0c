//! The document pipeline orchestrator.
//!
//! A run goes through two fan-out/fan-in phases. Pages are detected and
//! reconciled concurrently on the page pool; once every page is back, region
//! ids are assigned document-wide and the regions are recognized concurrently
//! on the OCR pool. Only rasterization can fail the whole document.

use super::assemble::ResultAssembler;
use super::recognize::{OcrOutcome, recognize_with_retry};
use super::state::{PipelineState, StateMachine};
use crate::core::config::{ConfigValidator, ParallelPolicy, PipelineOptions};
use crate::core::errors::{FailureKind, PipelineError, RasterizeError};
use crate::core::traits::{Rasterizer, RegionDetector, TextRecognizer};
use crate::domain::{Document, DocumentResult, LanguageHint, Page, PipelineFailure, Region};
use crate::processors::{PageRegion, RegionReconciler};
use crate::utils::BBoxCrop;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of detecting and reconciling one page.
struct PageOutcome {
    regions: Vec<PageRegion>,
    failure: Option<PipelineFailure>,
}

/// Turns document bytes into a [`DocumentResult`].
///
/// The pipeline holds no per-document state, so one instance can process
/// several documents at once; options are passed per call.
pub struct DocumentPipeline {
    rasterizer: Arc<dyn Rasterizer>,
    detector: Arc<dyn RegionDetector>,
    recognizer: Arc<dyn TextRecognizer>,
    page_pool: rayon::ThreadPool,
    ocr_pool: rayon::ThreadPool,
}

impl std::fmt::Debug for DocumentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentPipeline")
            .field("detector", &self.detector.name())
            .field("recognizer", &self.recognizer.name())
            .field("page_workers", &self.page_pool.current_num_threads())
            .field("ocr_workers", &self.ocr_pool.current_num_threads())
            .finish()
    }
}

impl DocumentPipeline {
    /// Starts building a pipeline.
    pub fn builder() -> DocumentPipelineBuilder {
        DocumentPipelineBuilder::default()
    }

    /// Processes a document.
    pub fn process(
        &self,
        bytes: &[u8],
        options: &PipelineOptions,
    ) -> Result<DocumentResult, PipelineError> {
        self.process_with_cancel(bytes, options, &CancellationToken::new())
    }

    /// Processes a document, stopping early when `cancel` fires.
    ///
    /// Cancellation stops new detector and OCR calls from being issued; calls
    /// already running finish and their results are kept. Pages and regions
    /// that were skipped are reported as [`FailureKind::Cancelled`].
    pub fn process_with_cancel(
        &self,
        bytes: &[u8],
        options: &PipelineOptions,
        cancel: &CancellationToken,
    ) -> Result<DocumentResult, PipelineError> {
        options.validate()?;

        let started = Instant::now();
        let document_id = uuid::Uuid::new_v4().to_string();
        let mut machine = StateMachine::new(document_id.as_str());

        let document = match self.rasterize(bytes, options.dpi) {
            Ok(pages) => Document::with_id(document_id.clone(), pages),
            Err(e) => {
                machine.advance(PipelineState::Failed)?;
                warn!(document_id = %document_id, error = %e, "document is unreadable");
                return Err(e);
            }
        };
        info!(
            document_id = %document.id,
            pages = document.page_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document rasterized"
        );

        machine.advance(PipelineState::Detecting)?;
        let reconciler = RegionReconciler::from_options(options);
        let page_outcomes: Vec<PageOutcome> = self.page_pool.install(|| {
            document
                .pages
                .par_iter()
                .map(|page| self.detect_page(&document.id, page, &reconciler, cancel))
                .collect()
        });

        machine.advance(PipelineState::Reconciling)?;
        let mut assembler = ResultAssembler::new(document.id.as_str(), document.page_count());
        let mut reconciled = Vec::with_capacity(page_outcomes.len());
        for outcome in page_outcomes {
            if let Some(failure) = outcome.failure {
                assembler.record_page_failure(failure);
            }
            reconciled.push(outcome.regions);
        }
        let regions = RegionReconciler::assign_ids(reconciled);
        debug!(document_id = %document.id, regions = regions.len(), "region ids assigned");

        machine.advance(PipelineState::Recognizing)?;
        let outcomes = self.recognize_regions(&document, &regions, options, cancel);

        machine.advance(PipelineState::Assembling)?;
        for (region, outcome) in regions.into_iter().zip(outcomes) {
            assembler.push_region(region, outcome);
        }
        let result = assembler.finish();

        machine.advance(PipelineState::Done(result.status))?;
        info!(
            document_id = %result.document_id,
            pages = result.page_count,
            regions = result.regions.len(),
            errors = result.errors.len(),
            status = ?result.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document processed"
        );
        Ok(result)
    }

    /// Rasterizes and normalizes page indices to their position.
    fn rasterize(&self, bytes: &[u8], dpi: f32) -> Result<Vec<Page>, PipelineError> {
        let mut pages = self.rasterizer.rasterize(bytes, dpi)?;
        if pages.is_empty() {
            return Err(RasterizeError::EmptyDocument.into());
        }
        for (position, page) in pages.iter_mut().enumerate() {
            if page.image.width() == 0 || page.image.height() == 0 {
                return Err(PipelineError::unreadable(format!(
                    "page {} rendered to an empty {}x{} image",
                    position + 1,
                    page.image.width(),
                    page.image.height()
                )));
            }
            if page.index != position {
                warn!(
                    reported = page.index,
                    position, "rasterizer returned an out-of-order page index"
                );
                page.index = position;
            }
        }
        Ok(pages)
    }

    fn detect_page(
        &self,
        document_id: &str,
        page: &Page,
        reconciler: &RegionReconciler,
        cancel: &CancellationToken,
    ) -> PageOutcome {
        if cancel.is_cancelled() {
            return PageOutcome {
                regions: Vec::new(),
                failure: Some(PipelineFailure::page(
                    page.index,
                    FailureKind::Cancelled,
                    "cancelled before detection",
                )),
            };
        }

        let started = Instant::now();
        match self.detector.detect(page) {
            Ok(mut detections) => {
                for detection in &mut detections {
                    detection.page_index = page.index;
                }
                debug!(
                    document_id,
                    page = page.index,
                    detections = detections.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "page detected"
                );
                PageOutcome {
                    regions: reconciler.reconcile_page(page.index, detections),
                    failure: None,
                }
            }
            Err(e) => {
                warn!(
                    document_id,
                    page = page.index,
                    detector = self.detector.name(),
                    error = %e,
                    "detection failed; page contributes no regions"
                );
                PageOutcome {
                    regions: Vec::new(),
                    failure: Some(
                        PipelineFailure::page(
                            page.index,
                            FailureKind::DetectionFailure,
                            e.to_string(),
                        )
                        .with_attempts(1),
                    ),
                }
            }
        }
    }

    fn recognize_regions(
        &self,
        document: &Document,
        regions: &[Region],
        options: &PipelineOptions,
        cancel: &CancellationToken,
    ) -> Vec<OcrOutcome> {
        let hint = options.language_hint();
        if let Some(language) = self.unsupported_language(&hint) {
            warn!(
                document_id = %document.id,
                language = %language,
                recognizer = self.recognizer.name(),
                "language hint not supported; skipping OCR"
            );
            let message = format!("unsupported language '{}'", language);
            return regions
                .iter()
                .map(|_| OcrOutcome::not_attempted(FailureKind::UnsupportedLanguage, &message))
                .collect();
        }

        self.ocr_pool.install(|| {
            regions
                .par_iter()
                .map(|region| self.recognize_region(document, region, &hint, options, cancel))
                .collect()
        })
    }

    fn unsupported_language(&self, hint: &LanguageHint) -> Option<String> {
        let supported = self.recognizer.supported_languages()?;
        hint.first_unsupported(supported).map(str::to_string)
    }

    fn recognize_region(
        &self,
        document: &Document,
        region: &Region,
        hint: &LanguageHint,
        options: &PipelineOptions,
        cancel: &CancellationToken,
    ) -> OcrOutcome {
        let Some(page) = document.pages.get(region.page_index) else {
            return OcrOutcome::not_attempted(
                FailureKind::RecognitionFailure,
                format!("page {} does not exist", region.page_index),
            );
        };
        if cancel.is_cancelled() {
            return OcrOutcome::not_attempted(FailureKind::Cancelled, "cancelled before recognition");
        }

        let padding = options.crop_padding_for(region.class);
        let crop = match BBoxCrop::crop_padded(&page.image, &region.bbox, padding) {
            Ok(crop) => crop,
            Err(e) => {
                return OcrOutcome::not_attempted(FailureKind::RecognitionFailure, e.to_string());
            }
        };

        let started = Instant::now();
        let outcome = recognize_with_retry(
            self.recognizer.as_ref(),
            &crop.image,
            hint,
            region.class,
            options.max_ocr_retries,
            cancel,
        );
        match outcome {
            OcrOutcome::Recognized { mut text, attempts } => {
                for span in &mut text.spans {
                    span.bbox = span.bbox.map(|b| crop.to_page(&b));
                }
                debug!(
                    document_id = %document.id,
                    region_id = %region.id,
                    page = region.page_index,
                    attempts,
                    chars = text.text.chars().count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "region recognized"
                );
                OcrOutcome::Recognized { text, attempts }
            }
            OcrOutcome::Failed {
                kind,
                message,
                attempts,
            } => {
                warn!(
                    document_id = %document.id,
                    region_id = %region.id,
                    page = region.page_index,
                    kind = %kind,
                    attempts,
                    error = %message,
                    "region has no text"
                );
                OcrOutcome::Failed {
                    kind,
                    message,
                    attempts,
                }
            }
        }
    }
}

/// Builder for [`DocumentPipeline`].
#[derive(Default)]
pub struct DocumentPipelineBuilder {
    rasterizer: Option<Arc<dyn Rasterizer>>,
    detector: Option<Arc<dyn RegionDetector>>,
    recognizer: Option<Arc<dyn TextRecognizer>>,
    policy: ParallelPolicy,
}

impl DocumentPipelineBuilder {
    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn detector(mut self, detector: Arc<dyn RegionDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn parallel_policy(mut self, policy: ParallelPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the pipeline and its worker pools.
    ///
    /// The OCR pool is capped at the recognizer's concurrency limit.
    pub fn build(self) -> Result<DocumentPipeline, PipelineError> {
        let rasterizer = self.rasterizer.ok_or_else(|| {
            PipelineError::config_error_detailed("pipeline builder", "no rasterizer was provided")
        })?;
        let detector = self.detector.ok_or_else(|| {
            PipelineError::config_error_detailed("pipeline builder", "no region detector was provided")
        })?;
        let recognizer = self.recognizer.ok_or_else(|| {
            PipelineError::config_error_detailed("pipeline builder", "no text recognizer was provided")
        })?;
        self.policy.validate()?;

        let engine_limit = recognizer.max_concurrency().unwrap_or(usize::MAX);
        let page_pool = self.policy.build_page_pool().map_err(|e| {
            PipelineError::config_error_detailed("page worker pool", e.to_string())
        })?;
        let ocr_pool = self.policy.build_ocr_pool(engine_limit).map_err(|e| {
            PipelineError::config_error_detailed("OCR worker pool", e.to_string())
        })?;

        info!(
            detector = detector.name(),
            recognizer = recognizer.name(),
            page_workers = page_pool.current_num_threads(),
            ocr_workers = ocr_pool.current_num_threads(),
            "document pipeline ready"
        );

        Ok(DocumentPipeline {
            rasterizer,
            detector,
            recognizer,
            page_pool,
            ocr_pool,
        })
    }
}
