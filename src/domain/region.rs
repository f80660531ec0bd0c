//! Reconciled regions.

use super::detection::{Detection, RegionClass};
use crate::processors::BoundingBox;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Document-unique region identifier, assigned in page-major reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u32);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A reconciled content region.
///
/// Produced by merging one or more overlapping [`Detection`]s. The box is the
/// union of its provenance and the confidence is their maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub page_index: usize,
    pub bbox: BoundingBox,
    pub class: RegionClass,
    pub confidence: f32,
    /// Rank within the page, starting at 0.
    pub reading_order: usize,
    /// Detections merged into this region, highest confidence first.
    pub provenance: Vec<Detection>,
}
