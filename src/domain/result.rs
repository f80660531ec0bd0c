//! The structured result of processing one document.

use super::region::{Region, RegionId};
use super::text::RecognizedText;
use crate::core::errors::FailureKind;
use serde::{Deserialize, Serialize};

/// Whether every page and region was processed successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Complete,
    Partial,
}

/// A non-fatal failure captured while processing a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineFailure {
    pub page_index: usize,
    /// Set for region-level failures, `None` for page-level ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<RegionId>,
    pub kind: FailureKind,
    pub message: String,
    /// Collaborator calls made before giving up; 0 when no call was issued.
    pub attempts: u32,
}

impl PipelineFailure {
    /// A failure affecting a whole page.
    pub fn page(page_index: usize, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            page_index,
            region_id: None,
            kind,
            message: message.into(),
            attempts: 0,
        }
    }

    /// A failure affecting one region.
    pub fn region(region: &Region, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            page_index: region.page_index,
            region_id: Some(region.id),
            kind,
            message: message.into(),
            attempts: 0,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Returns `true` if the failure concerns a whole page.
    pub fn is_page_level(&self) -> bool {
        self.region_id.is_none()
    }
}

/// A region paired with its text or with the reason it has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionResult {
    pub region: Region,
    pub text: RecognizedText,
    /// Set when OCR did not produce `text`; the text is then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureKind>,
}

/// The output of [`DocumentPipeline::process`](crate::pipeline::DocumentPipeline::process).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub document_id: String,
    pub page_count: usize,
    pub status: DocumentStatus,
    /// Every reconciled region, page-major in reading order.
    pub regions: Vec<RegionResult>,
    /// Page-level failures first, then region-level failures in region order.
    pub errors: Vec<PipelineFailure>,
}

impl DocumentResult {
    /// Returns `true` if nothing failed.
    pub fn is_complete(&self) -> bool {
        self.status == DocumentStatus::Complete
    }

    /// Ids of regions that carry an error.
    pub fn failed_region_ids(&self) -> Vec<RegionId> {
        self.regions
            .iter()
            .filter(|r| r.error.is_some())
            .map(|r| r.region.id)
            .collect()
    }

    /// Regions of one page, in reading order.
    pub fn page_regions(&self, page_index: usize) -> impl Iterator<Item = &RegionResult> {
        self.regions
            .iter()
            .filter(move |r| r.region.page_index == page_index)
    }

    /// Text of one page: non-empty region texts joined by blank lines.
    pub fn page_text(&self, page_index: usize) -> String {
        self.page_regions(page_index)
            .map(|r| r.text.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Text of the whole document, pages separated by form feeds.
    pub fn full_text(&self) -> String {
        (0..self.page_count)
            .map(|page| self.page_text(page))
            .collect::<Vec<_>>()
            .join("\n\x0c\n")
    }
}
