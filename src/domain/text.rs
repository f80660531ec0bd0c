//! Recognized text and OCR language hints.

use super::region::RegionId;
use crate::processors::BoundingBox;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A piece of recognized text, usually one word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    /// Engine confidence in `[0, 1]`.
    pub confidence: f32,
    /// Position of the span, relative to the crop while it is inside a
    /// recognizer and in page coordinates once assembled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bbox: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

/// Text recognized in one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    /// The region this text belongs to; set by the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<RegionId>,
    /// Full text of the region.
    pub text: String,
    /// Character-length weighted mean of the span confidences; 0 without spans.
    pub confidence: f32,
    pub spans: Vec<TextSpan>,
}

impl RecognizedText {
    /// Builds a result from the full text and its spans.
    pub fn new(text: impl Into<String>, spans: Vec<TextSpan>) -> Self {
        let confidence = weighted_confidence(&spans);
        Self {
            region_id: None,
            text: text.into(),
            confidence,
            spans,
        }
    }

    /// Builds a result whose text is the spans joined by single spaces.
    pub fn from_spans(spans: Vec<TextSpan>) -> Self {
        let text = spans
            .iter()
            .map(|s| s.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(text, spans)
    }

    /// The placeholder recorded for a region whose OCR did not succeed.
    pub fn empty() -> Self {
        Self {
            region_id: None,
            text: String::new(),
            confidence: 0.0,
            spans: Vec::new(),
        }
    }

    /// Attaches the region id.
    pub fn for_region(mut self, id: RegionId) -> Self {
        self.region_id = Some(id);
        self
    }

    /// Returns `true` when no text was recognized.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

fn weighted_confidence(spans: &[TextSpan]) -> f32 {
    if spans.is_empty() {
        return 0.0;
    }
    let (weighted, chars) = spans.iter().fold((0.0f32, 0usize), |(sum, n), span| {
        let len = span.text.chars().count();
        (sum + span.confidence * len as f32, n + len)
    });
    if chars == 0 {
        // No text to weight by: fall back to the plain mean.
        return spans.iter().map(|s| s.confidence).sum::<f32>() / spans.len() as f32;
    }
    weighted / chars as f32
}

/// Ordered OCR language codes.
///
/// Engines that take a combined hint receive the codes joined with `+`
/// (`eng+fra`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageHint(Vec<String>);

impl LanguageHint {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(codes.into_iter().map(Into::into).collect())
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    /// Returns the first code that is not in `supported`.
    pub fn first_unsupported<'a>(&'a self, supported: &[String]) -> Option<&'a str> {
        self.0
            .iter()
            .find(|code| !supported.contains(code))
            .map(String::as_str)
    }
}

impl fmt::Display for LanguageHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("+"))
    }
}
