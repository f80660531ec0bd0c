//! Raw detector output.

use crate::processors::BoundingBox;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic class of a page region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionClass {
    /// Body text
    Text,
    /// Document or section title
    Title,
    /// List items
    List,
    /// Table
    Table,
    /// Image, chart or figure
    Figure,
    /// Figure or table caption
    Caption,
    /// Page header
    Header,
    /// Page footer
    Footer,
    /// Mathematical formula
    Formula,
}

impl RegionClass {
    /// Every class, in declaration order.
    pub const ALL: [RegionClass; 9] = [
        RegionClass::Text,
        RegionClass::Title,
        RegionClass::List,
        RegionClass::Table,
        RegionClass::Figure,
        RegionClass::Caption,
        RegionClass::Header,
        RegionClass::Footer,
        RegionClass::Formula,
    ];

    /// Returns the string representation of the class.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionClass::Text => "text",
            RegionClass::Title => "title",
            RegionClass::List => "list",
            RegionClass::Table => "table",
            RegionClass::Figure => "figure",
            RegionClass::Caption => "caption",
            RegionClass::Header => "header",
            RegionClass::Footer => "footer",
            RegionClass::Formula => "formula",
        }
    }

    /// Maps a model label onto a region class.
    ///
    /// Accepts the common aliases used by layout models (`paragraph`,
    /// `section_header`, `picture`, `page_footer`, ...). Returns `None` for
    /// labels with no counterpart.
    pub fn from_label(label: &str) -> Option<Self> {
        let class = match label.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "text" | "paragraph" | "plain_text" | "abstract" | "footnote" => RegionClass::Text,
            "title" | "doc_title" | "paragraph_title" | "section_header" | "heading" => {
                RegionClass::Title
            }
            "list" | "list_item" => RegionClass::List,
            "table" => RegionClass::Table,
            "figure" | "image" | "picture" | "chart" => RegionClass::Figure,
            "caption" | "figure_title" | "table_title" | "figure_caption" | "table_caption" => {
                RegionClass::Caption
            }
            "header" | "page_header" => RegionClass::Header,
            "footer" | "page_footer" => RegionClass::Footer,
            "formula" | "equation" => RegionClass::Formula,
            _ => return None,
        };
        Some(class)
    }
}

impl fmt::Display for RegionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single candidate region emitted by a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Page the detection belongs to.
    pub page_index: usize,
    /// Box in page pixel coordinates.
    pub bbox: BoundingBox,
    /// Predicted class.
    pub class: RegionClass,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Detection {
    /// Creates a detection; the confidence is clamped to `[0, 1]` and NaN
    /// becomes 0.
    pub fn new(page_index: usize, bbox: BoundingBox, class: RegionClass, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            page_index,
            bbox,
            class,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_aliases() {
        assert_eq!(RegionClass::from_label("Section-header"), Some(RegionClass::Title));
        assert_eq!(RegionClass::from_label("picture"), Some(RegionClass::Figure));
        assert_eq!(RegionClass::from_label("page_footer"), Some(RegionClass::Footer));
        assert_eq!(RegionClass::from_label("seal"), None);
    }

    #[test]
    fn test_as_str_round_trips_through_from_label() {
        for class in RegionClass::ALL {
            assert_eq!(RegionClass::from_label(class.as_str()), Some(class));
        }
    }

    #[test]
    fn test_confidence_clamped() {
        let bbox = BoundingBox::from_coords(0.0, 0.0, 1.0, 1.0);
        assert_eq!(Detection::new(0, bbox, RegionClass::Text, 1.7).confidence, 1.0);
        assert_eq!(Detection::new(0, bbox, RegionClass::Text, -0.2).confidence, 0.0);
        assert_eq!(Detection::new(0, bbox, RegionClass::Text, f32::NAN).confidence, 0.0);
    }
}
