//! Result assembly.

use super::recognize::OcrOutcome;
use crate::core::errors::FailureKind;
use crate::domain::{
    DocumentResult, DocumentStatus, PipelineFailure, RecognizedText, Region, RegionResult,
};

/// Collects per-page and per-region outcomes into a [`DocumentResult`].
///
/// Regions must be pushed in reconciler order; they are emitted in that order
/// and none is ever dropped.
#[derive(Debug)]
pub struct ResultAssembler {
    document_id: String,
    page_count: usize,
    page_failures: Vec<PipelineFailure>,
    region_failures: Vec<PipelineFailure>,
    regions: Vec<RegionResult>,
}

impl ResultAssembler {
    pub fn new(document_id: impl Into<String>, page_count: usize) -> Self {
        Self {
            document_id: document_id.into(),
            page_count,
            page_failures: Vec::new(),
            region_failures: Vec::new(),
            regions: Vec::new(),
        }
    }

    /// Records a failure that affected a whole page.
    pub fn record_page_failure(&mut self, failure: PipelineFailure) {
        self.page_failures.push(failure);
    }

    /// Adds a region together with the outcome of its OCR.
    pub fn push_region(&mut self, region: Region, outcome: OcrOutcome) {
        match outcome {
            OcrOutcome::Recognized { text, .. } => {
                let text = text.for_region(region.id);
                self.regions.push(RegionResult {
                    region,
                    text,
                    error: None,
                });
            }
            OcrOutcome::Failed {
                kind,
                message,
                attempts,
            } => self.push_failed(region, kind, message, attempts),
        }
    }

    /// Adds a region whose OCR produced no text.
    pub fn push_failed(
        &mut self,
        region: Region,
        kind: FailureKind,
        message: impl Into<String>,
        attempts: u32,
    ) {
        self.region_failures
            .push(PipelineFailure::region(&region, kind, message).with_attempts(attempts));
        let text = RecognizedText::empty().for_region(region.id);
        self.regions.push(RegionResult {
            region,
            text,
            error: Some(kind),
        });
    }

    /// Produces the result; the status is complete only if nothing failed.
    pub fn finish(mut self) -> DocumentResult {
        self.page_failures.sort_by_key(|f| f.page_index);

        let status = if self.page_failures.is_empty() && self.region_failures.is_empty() {
            DocumentStatus::Complete
        } else {
            DocumentStatus::Partial
        };

        let mut errors = self.page_failures;
        errors.extend(self.region_failures);

        DocumentResult {
            document_id: self.document_id,
            page_count: self.page_count,
            status,
            regions: self.regions,
            errors,
        }
    }
}
