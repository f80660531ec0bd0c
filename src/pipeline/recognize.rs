//! Region OCR with bounded retries and cancellation.

use crate::core::errors::FailureKind;
use crate::core::traits::TextRecognizer;
use crate::domain::{LanguageHint, RecognizedText, RegionClass};
use image::RgbImage;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// What happened when OCR was run on one region.
#[derive(Debug, Clone, PartialEq)]
pub enum OcrOutcome {
    /// The engine returned text.
    Recognized {
        text: RecognizedText,
        /// Calls made, including the successful one.
        attempts: u32,
    },
    /// No text; the region is kept with an error.
    Failed {
        kind: FailureKind,
        message: String,
        /// Calls made before giving up; 0 when none was issued.
        attempts: u32,
    },
}

impl OcrOutcome {
    /// An outcome for a region whose OCR was never attempted.
    pub fn not_attempted(kind: FailureKind, message: impl Into<String>) -> Self {
        OcrOutcome::Failed {
            kind,
            message: message.into(),
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            OcrOutcome::Recognized { attempts, .. } | OcrOutcome::Failed { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Runs `recognizer` on `image` as a region of `class`, retrying recognition
/// failures.
///
/// At most `1 + max_retries` calls are made. Unsupported-language errors are
/// not retried. The token is checked before every call; once it is cancelled
/// no further call is issued and the region is reported as cancelled.
pub fn recognize_with_retry(
    recognizer: &dyn TextRecognizer,
    image: &RgbImage,
    hint: &LanguageHint,
    class: RegionClass,
    max_retries: u32,
    cancel: &CancellationToken,
) -> OcrOutcome {
    let mut last_error = String::new();

    for attempt in 1..=max_retries.saturating_add(1) {
        if cancel.is_cancelled() {
            let message = if attempt == 1 {
                "cancelled before recognition".to_string()
            } else {
                format!("cancelled before retry; last error: {}", last_error)
            };
            return OcrOutcome::Failed {
                kind: FailureKind::Cancelled,
                message,
                attempts: attempt - 1,
            };
        }

        match recognizer.recognize_class(image, hint, class) {
            Ok(text) => {
                return OcrOutcome::Recognized {
                    text,
                    attempts: attempt,
                };
            }
            Err(e) if !e.is_retryable() => {
                return OcrOutcome::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                    attempts: attempt,
                };
            }
            Err(e) => {
                warn!(
                    recognizer = recognizer.name(),
                    attempt,
                    error = %e,
                    "recognition attempt failed"
                );
                last_error = e.to_string();
            }
        }
    }

    OcrOutcome::Failed {
        kind: FailureKind::RecognitionFailure,
        message: last_error,
        attempts: max_retries.saturating_add(1),
    }
}
