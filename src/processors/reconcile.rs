//! Region reconciliation.
//!
//! Turns raw, possibly overlapping detections into a clean set of regions per
//! page, orders them for reading and numbers them across the document.
//!
//! Per page the reconciler:
//! 1. drops detections below the confidence floor and degenerate boxes,
//! 2. sorts the rest by confidence, highest first (stable),
//! 3. accepts each detection as a new region unless it overlaps an accepted
//!    region with IoU >= threshold, or is nested with one of the same class, in
//!    which case it is merged into the best-overlapping one,
//! 4. repeats merging between accepted regions until none qualify, since
//!    widened boxes can create new overlaps,
//! 5. sorts by row band, then left edge, then confidence, then acceptance order.
//!
//! [`RegionReconciler::assign_ids`] then numbers the regions page-major.

use crate::core::config::PipelineOptions;
use crate::domain::{Detection, Region, RegionClass, RegionId};
use crate::processors::BoundingBox;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// A reconciled region that has not been given a document-wide id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRegion {
    pub page_index: usize,
    pub bbox: BoundingBox,
    pub class: RegionClass,
    pub confidence: f32,
    /// Rank within the page.
    pub reading_order: usize,
    pub provenance: Vec<Detection>,
}

impl PageRegion {
    fn into_region(self, id: RegionId) -> Region {
        Region {
            id,
            page_index: self.page_index,
            bbox: self.bbox,
            class: self.class,
            confidence: self.confidence,
            reading_order: self.reading_order,
            provenance: self.provenance,
        }
    }
}

/// Working state of a region during the accept/merge pass.
#[derive(Debug)]
struct Candidate {
    bbox: BoundingBox,
    class: RegionClass,
    confidence: f32,
    provenance: Vec<Detection>,
    accepted_at: usize,
}

impl Candidate {
    fn new(detection: Detection, accepted_at: usize) -> Self {
        Self {
            bbox: detection.bbox,
            class: detection.class,
            confidence: detection.confidence,
            provenance: vec![detection],
            accepted_at,
        }
    }

    fn absorb_detection(&mut self, detection: Detection) {
        self.bbox = self.bbox.union(&detection.bbox);
        self.confidence = self.confidence.max(detection.confidence);
        self.provenance.push(detection);
    }

    fn absorb(&mut self, other: Candidate) {
        self.bbox = self.bbox.union(&other.bbox);
        self.confidence = self.confidence.max(other.confidence);
        self.provenance.extend(other.provenance);
        self.provenance
            .sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    }
}

/// Merges overlapping detections and imposes a reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionReconciler {
    iou_threshold: f32,
    min_confidence: f32,
    row_band_height: f32,
}

impl Default for RegionReconciler {
    fn default() -> Self {
        Self::from_options(&PipelineOptions::default())
    }
}

impl RegionReconciler {
    /// Creates a reconciler.
    ///
    /// # Arguments
    ///
    /// * `iou_threshold` - IoU at or above which two boxes are merged.
    /// * `min_confidence` - Detections below this confidence are discarded.
    /// * `row_band_height` - Height in pixels of a reading-order row band.
    pub fn new(iou_threshold: f32, min_confidence: f32, row_band_height: f32) -> Self {
        Self {
            iou_threshold,
            min_confidence,
            row_band_height,
        }
    }

    /// Creates a reconciler from pipeline options.
    pub fn from_options(options: &PipelineOptions) -> Self {
        Self::new(
            options.iou_threshold,
            options.min_confidence,
            options.row_band_height,
        )
    }

    /// Reconciles the detections of one page.
    ///
    /// Every detection is treated as belonging to `page_index`. The returned
    /// regions are sorted in reading order with `reading_order` set.
    pub fn reconcile_page(&self, page_index: usize, detections: Vec<Detection>) -> Vec<PageRegion> {
        let input_count = detections.len();
        let mut kept: Vec<Detection> = detections
            .into_iter()
            .filter(|d| {
                if d.confidence.is_nan() || d.confidence < self.min_confidence {
                    return false;
                }
                if d.bbox.is_degenerate() {
                    warn!(page = page_index, bbox = ?d.bbox, "dropping degenerate detection");
                    return false;
                }
                true
            })
            .map(|mut d| {
                d.page_index = page_index;
                d
            })
            .collect();

        kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut accepted: Vec<Candidate> = Vec::new();
        for detection in kept {
            match self.best_match(&accepted, &detection.bbox, detection.class) {
                Some(idx) => accepted[idx].absorb_detection(detection),
                None => {
                    let seq = accepted.len();
                    accepted.push(Candidate::new(detection, seq));
                }
            }
        }

        self.consolidate(&mut accepted);

        accepted.sort_by(|a, b| self.reading_cmp(a, b));

        let regions: Vec<PageRegion> = accepted
            .into_iter()
            .enumerate()
            .map(|(rank, c)| PageRegion {
                page_index,
                bbox: c.bbox,
                class: c.class,
                confidence: c.confidence,
                reading_order: rank,
                provenance: c.provenance,
            })
            .collect();

        debug!(
            page = page_index,
            detections = input_count,
            regions = regions.len(),
            "page reconciled"
        );
        regions
    }

    /// Numbers reconciled pages sequentially from 0, page-major.
    ///
    /// `pages` must be in ascending page order with each page already in
    /// reading order, as returned by [`reconcile_page`](Self::reconcile_page).
    pub fn assign_ids<I>(pages: I) -> Vec<Region>
    where
        I: IntoIterator<Item = Vec<PageRegion>>,
    {
        pages
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(i, region)| region.into_region(RegionId(i as u32)))
            .collect()
    }

    /// Reconciles detections from a whole document at once.
    pub fn reconcile(&self, detections: Vec<Detection>) -> Vec<Region> {
        let mut by_page: std::collections::BTreeMap<usize, Vec<Detection>> =
            std::collections::BTreeMap::new();
        for detection in detections {
            by_page
                .entry(detection.page_index)
                .or_default()
                .push(detection);
        }
        Self::assign_ids(
            by_page
                .into_iter()
                .map(|(page, dets)| self.reconcile_page(page, dets)),
        )
    }

    fn qualifies(
        &self,
        a: &BoundingBox,
        a_class: RegionClass,
        b: &BoundingBox,
        b_class: RegionClass,
    ) -> Option<f32> {
        let iou = a.iou(b);
        if iou >= self.iou_threshold || (a_class == b_class && a.contains_or_within(b)) {
            Some(iou)
        } else {
            None
        }
    }

    /// Index of the accepted region with the highest IoU among those that
    /// qualify for a merge; ties go to the earliest accepted.
    fn best_match(
        &self,
        accepted: &[Candidate],
        bbox: &BoundingBox,
        class: RegionClass,
    ) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, candidate) in accepted.iter().enumerate() {
            if let Some(iou) = self.qualifies(&candidate.bbox, candidate.class, bbox, class) {
                if best.map_or(true, |(_, best_iou)| iou > best_iou) {
                    best = Some((idx, iou));
                }
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Merges accepted regions into each other until no pair qualifies.
    ///
    /// The later-accepted region is folded into the earlier one, so the
    /// surviving class is the one of the higher-confidence detection.
    fn consolidate(&self, accepted: &mut Vec<Candidate>) {
        loop {
            let pair = (0..accepted.len()).find_map(|i| {
                (i + 1..accepted.len())
                    .find(|&j| {
                        self.qualifies(
                            &accepted[i].bbox,
                            accepted[i].class,
                            &accepted[j].bbox,
                            accepted[j].class,
                        )
                        .is_some()
                    })
                    .map(|j| (i, j))
            });
            match pair {
                Some((i, j)) => {
                    let absorbed = accepted.remove(j);
                    accepted[i].absorb(absorbed);
                }
                None => break,
            }
        }
    }

    fn row_band(&self, bbox: &BoundingBox) -> i64 {
        (bbox.y0 / self.row_band_height).floor() as i64
    }

    fn reading_cmp(&self, a: &Candidate, b: &Candidate) -> Ordering {
        self.row_band(&a.bbox)
            .cmp(&self.row_band(&b.bbox))
            .then_with(|| a.bbox.x0.total_cmp(&b.bbox.x0))
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.accepted_at.cmp(&b.accepted_at))
    }
}
