//! Image and geometry processing used between the pipeline stages.

pub mod binarize;
pub mod geometry;
pub mod reconcile;

pub use binarize::binarize_for_ocr;
pub use geometry::BoundingBox;
pub use reconcile::{PageRegion, RegionReconciler};
