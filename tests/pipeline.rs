//! End-to-end pipeline behavior with scripted collaborators.

use docsift::core::{
    DetectionError, FailureKind, ParallelPolicy, PipelineError, PipelineOptions, RasterizeError,
    RecognitionError, StatusClass,
};
use docsift::core::traits::{Rasterizer, RegionDetector, TextRecognizer};
use docsift::domain::{
    Detection, DocumentResult, DocumentStatus, LanguageHint, Page, RecognizedText, RegionClass,
    RegionId, TextSpan,
};
use docsift::pipeline::DocumentPipeline;
use docsift::processors::BoundingBox;
use image::{Rgb, RgbImage};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Produces blank pages of fixed sizes.
struct BlankPages {
    sizes: Vec<(u32, u32)>,
    calls: AtomicUsize,
}

impl BlankPages {
    fn new(count: usize) -> Self {
        Self {
            sizes: vec![(200, 100); count],
            calls: AtomicUsize::new(0),
        }
    }
}

impl Rasterizer for BlankPages {
    fn rasterize(&self, bytes: &[u8], _dpi: f32) -> Result<Vec<Page>, RasterizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if bytes.is_empty() {
            return Err(RasterizeError::Load("no bytes".to_string()));
        }
        Ok(self
            .sizes
            .iter()
            .enumerate()
            .map(|(index, &(w, h))| Page::new(index, RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))))
            .collect())
    }
}

/// Returns fixed detections per page; pages without an entry fail.
struct ScriptedDetector {
    pages: HashMap<usize, Vec<Detection>>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    fn new(pages: impl IntoIterator<Item = (usize, Vec<Detection>)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl RegionDetector for ScriptedDetector {
    fn detect(&self, page: &Page) -> Result<Vec<Detection>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(&page.index)
            .cloned()
            .ok_or_else(|| DetectionError::Inference {
                model_name: "scripted".to_string(),
                message: format!("no script for page {}", page.index),
            })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Reads the crop size back as text, with one span at a fixed crop position.
struct SizeReader {
    fail_first: AtomicU32,
    always_fail: bool,
    reject_language: Option<String>,
    supported: Option<Vec<String>>,
    calls: AtomicUsize,
}

impl SizeReader {
    fn new() -> Self {
        Self {
            fail_first: AtomicU32::new(0),
            always_fail: false,
            reject_language: None,
            supported: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextRecognizer for SizeReader {
    fn recognize(
        &self,
        image: &RgbImage,
        hint: &LanguageHint,
    ) -> Result<RecognizedText, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(language) = &self.reject_language {
            if hint.codes().contains(language) {
                return Err(RecognitionError::UnsupportedLanguage {
                    language: language.clone(),
                });
            }
        }
        if self.always_fail {
            return Err(RecognitionError::Failed("engine crashed".to_string()));
        }
        let pending = self.fail_first.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_first.store(pending - 1, Ordering::SeqCst);
            return Err(RecognitionError::Failed("timeout".to_string()));
        }
        let text = format!("{}x{}", image.width(), image.height());
        Ok(RecognizedText::from_spans(vec![
            TextSpan::new(text, 0.9).with_bbox(BoundingBox::from_coords(1.0, 2.0, 11.0, 7.0)),
        ]))
    }

    fn supported_languages(&self) -> Option<&[String]> {
        self.supported.as_deref()
    }

    fn name(&self) -> &str {
        "size-reader"
    }
}

fn text_box(page: usize, x0: f32, y0: f32, x1: f32, y1: f32, confidence: f32) -> Detection {
    Detection::new(
        page,
        BoundingBox::from_coords(x0, y0, x1, y1),
        RegionClass::Text,
        confidence,
    )
}

fn pipeline(
    rasterizer: Arc<BlankPages>,
    detector: Arc<ScriptedDetector>,
    recognizer: Arc<SizeReader>,
) -> DocumentPipeline {
    DocumentPipeline::builder()
        .rasterizer(rasterizer)
        .detector(detector)
        .recognizer(recognizer)
        .parallel_policy(
            ParallelPolicy::new()
                .with_page_workers(Some(2))
                .with_ocr_workers(Some(2)),
        )
        .build()
        .unwrap()
}

fn boxes(result: &DocumentResult) -> Vec<(RegionId, usize, usize, BoundingBox)> {
    result
        .regions
        .iter()
        .map(|r| {
            (
                r.region.id,
                r.region.page_index,
                r.region.reading_order,
                r.region.bbox,
            )
        })
        .collect()
}

#[test]
fn test_overlapping_detections_become_one_region() {
    let detector = Arc::new(ScriptedDetector::new([(
        0,
        vec![
            text_box(0, 0.0, 0.0, 100.0, 50.0, 0.9),
            text_box(0, 10.0, 5.0, 105.0, 55.0, 0.8),
        ],
    )]));
    let pipeline = pipeline(
        Arc::new(BlankPages::new(1)),
        detector,
        Arc::new(SizeReader::new()),
    );

    let result = pipeline.process(b"doc", &PipelineOptions::default()).unwrap();

    assert_eq!(result.status, DocumentStatus::Complete);
    assert_eq!(result.regions.len(), 1);
    let region = &result.regions[0].region;
    assert_eq!(region.bbox, BoundingBox::from_coords(0.0, 0.0, 105.0, 55.0));
    assert_eq!(region.provenance.len(), 2);
    assert_eq!(region.confidence, 0.9);
    // 105x55 box padded by 8 and clamped at the top-left corner.
    assert_eq!(result.regions[0].text.text, "113x63");
}

#[test]
fn test_low_confidence_detections_are_dropped() {
    let detector = Arc::new(ScriptedDetector::new([(
        0,
        vec![
            text_box(0, 0.0, 0.0, 100.0, 20.0, 0.9),
            text_box(0, 0.0, 60.0, 100.0, 80.0, 0.1),
        ],
    )]));
    let pipeline = pipeline(
        Arc::new(BlankPages::new(1)),
        detector,
        Arc::new(SizeReader::new()),
    );

    let result = pipeline.process(b"doc", &PipelineOptions::default()).unwrap();
    assert_eq!(result.regions.len(), 1);
    assert!(result.regions[0].region.provenance.iter().all(|d| d.confidence >= 0.25));
}

#[test]
fn test_failed_page_detection_gives_partial_result() {
    let detector = Arc::new(ScriptedDetector::new([
        (
            0,
            vec![
                text_box(0, 0.0, 0.0, 90.0, 20.0, 0.9),
                text_box(0, 0.0, 50.0, 90.0, 70.0, 0.8),
            ],
        ),
        (
            2,
            vec![
                text_box(2, 100.0, 0.0, 190.0, 20.0, 0.7),
                text_box(2, 0.0, 0.0, 90.0, 20.0, 0.6),
            ],
        ),
    ]));
    let pipeline = pipeline(
        Arc::new(BlankPages::new(3)),
        detector.clone(),
        Arc::new(SizeReader::new()),
    );

    let result = pipeline.process(b"doc", &PipelineOptions::default()).unwrap();

    assert_eq!(result.status, DocumentStatus::Partial);
    assert_eq!(result.page_count, 3);
    assert_eq!(detector.calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.page_regions(1).count(), 0);
    assert_eq!(result.page_regions(0).count(), 2);
    assert_eq!(result.page_regions(2).count(), 2);

    let ids: Vec<u32> = result.regions.iter().map(|r| r.region.id.0).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    // Same row band on page 2: left region first.
    assert_eq!(result.regions[2].region.bbox.x0, 0.0);

    assert_eq!(result.errors.len(), 1);
    let failure = &result.errors[0];
    assert_eq!(failure.page_index, 1);
    assert_eq!(failure.kind, FailureKind::DetectionFailure);
    assert_eq!(failure.region_id, None);
    assert_eq!(failure.attempts, 1);
    assert!(result.regions.iter().all(|r| r.error.is_none()));
}

#[test]
fn test_retry_recovers_region() {
    let detector = Arc::new(ScriptedDetector::new([(
        0,
        vec![text_box(0, 20.0, 20.0, 80.0, 40.0, 0.9)],
    )]));
    let recognizer = Arc::new(SizeReader::new());
    recognizer.fail_first.store(1, Ordering::SeqCst);
    let pipeline = pipeline(Arc::new(BlankPages::new(1)), detector, recognizer.clone());

    let result = pipeline
        .process(b"doc", &PipelineOptions::default().with_max_ocr_retries(1))
        .unwrap();

    assert!(result.is_complete());
    assert!(result.errors.is_empty());
    assert_eq!(result.regions[0].error, None);
    assert_eq!(result.regions[0].text.text, "76x36");
    assert_eq!(result.regions[0].text.region_id, Some(RegionId(0)));
    assert_eq!(recognizer.calls(), 2);
}

#[test]
fn test_failed_ocr_keeps_every_region() {
    let detector = Arc::new(ScriptedDetector::new([
        (0, vec![text_box(0, 0.0, 0.0, 90.0, 20.0, 0.9)]),
        (
            1,
            vec![
                text_box(1, 0.0, 0.0, 90.0, 20.0, 0.9),
                text_box(1, 0.0, 50.0, 90.0, 70.0, 0.9),
            ],
        ),
    ]));
    let mut reader = SizeReader::new();
    reader.always_fail = true;
    let recognizer = Arc::new(reader);
    let pipeline = pipeline(Arc::new(BlankPages::new(2)), detector, recognizer.clone());

    let options = PipelineOptions::default().with_max_ocr_retries(2);
    let result = pipeline.process(b"doc", &options).unwrap();

    assert_eq!(result.regions.len(), 3);
    assert_eq!(result.status, DocumentStatus::Partial);
    assert_eq!(
        result.failed_region_ids(),
        vec![RegionId(0), RegionId(1), RegionId(2)]
    );
    for entry in &result.regions {
        assert_eq!(entry.text.text, "");
        assert_eq!(entry.text.confidence, 0.0);
        assert_eq!(entry.error, Some(FailureKind::RecognitionFailure));
    }
    assert!(result.errors.iter().all(|f| f.attempts == 3));
    assert_eq!(recognizer.calls(), 9);
}

#[test]
fn test_processing_is_idempotent() {
    let detections = vec![
        text_box(0, 10.0, 60.0, 90.0, 80.0, 0.7),
        text_box(0, 0.0, 0.0, 100.0, 50.0, 0.9),
        text_box(0, 10.0, 5.0, 105.0, 55.0, 0.8),
        text_box(0, 120.0, 4.0, 190.0, 30.0, 0.6),
    ];
    let detector = Arc::new(ScriptedDetector::new([(0, detections.clone()), (1, detections)]));
    let pipeline = pipeline(
        Arc::new(BlankPages::new(2)),
        detector,
        Arc::new(SizeReader::new()),
    );
    let options = PipelineOptions::default();

    let first = pipeline.process(b"doc", &options).unwrap();
    let second = pipeline.process(b"doc", &options).unwrap();

    assert_ne!(first.document_id, second.document_id);
    assert_eq!(boxes(&first), boxes(&second));
    assert_eq!(first.full_text(), second.full_text());
    assert_eq!(first.regions.len(), 6);
}

#[test]
fn test_span_boxes_are_in_page_coordinates() {
    let detector = Arc::new(ScriptedDetector::new([(
        0,
        vec![text_box(0, 50.0, 40.0, 150.0, 90.0, 0.9)],
    )]));
    let pipeline = pipeline(
        Arc::new(BlankPages::new(1)),
        detector,
        Arc::new(SizeReader::new()),
    );

    let result = pipeline.process(b"doc", &PipelineOptions::default()).unwrap();
    let span = &result.regions[0].text.spans[0];
    // Crop origin is (42, 32) after 8px padding.
    assert_eq!(
        span.bbox,
        Some(BoundingBox::from_coords(43.0, 34.0, 53.0, 39.0))
    );
}

#[test]
fn test_detections_are_stamped_with_their_page() {
    let detector = Arc::new(ScriptedDetector::new([
        (0, vec![text_box(7, 0.0, 0.0, 50.0, 20.0, 0.9)]),
        (1, vec![text_box(7, 0.0, 0.0, 50.0, 20.0, 0.9)]),
    ]));
    let pipeline = pipeline(
        Arc::new(BlankPages::new(2)),
        detector,
        Arc::new(SizeReader::new()),
    );

    let result = pipeline.process(b"doc", &PipelineOptions::default()).unwrap();
    let pages: Vec<usize> = result.regions.iter().map(|r| r.region.page_index).collect();
    assert_eq!(pages, vec![0, 1]);
    assert_eq!(result.regions[1].region.provenance[0].page_index, 1);
}

#[test]
fn test_cancel_before_processing() {
    let detector = Arc::new(ScriptedDetector::new([
        (0, vec![text_box(0, 0.0, 0.0, 50.0, 20.0, 0.9)]),
        (1, vec![text_box(1, 0.0, 0.0, 50.0, 20.0, 0.9)]),
        (2, vec![text_box(2, 0.0, 0.0, 50.0, 20.0, 0.9)]),
    ]));
    let recognizer = Arc::new(SizeReader::new());
    let pipeline = pipeline(Arc::new(BlankPages::new(3)), detector.clone(), recognizer.clone());

    let token = CancellationToken::new();
    token.cancel();
    let result = pipeline
        .process_with_cancel(b"doc", &PipelineOptions::default(), &token)
        .unwrap();

    assert_eq!(result.status, DocumentStatus::Partial);
    assert_eq!(result.page_count, 3);
    assert!(result.regions.is_empty());
    assert_eq!(result.errors.len(), 3);
    assert!(result.errors.iter().all(|f| f.kind == FailureKind::Cancelled));
    let pages: Vec<usize> = result.errors.iter().map(|f| f.page_index).collect();
    assert_eq!(pages, vec![0, 1, 2]);
    assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
    assert_eq!(recognizer.calls(), 0);
}

/// Detects a fixed layout on every page and cancels the run once the given
/// page has been detected.
struct CancellingDetector {
    cancel_on_page: usize,
    token: CancellationToken,
}

impl RegionDetector for CancellingDetector {
    fn detect(&self, page: &Page) -> Result<Vec<Detection>, DetectionError> {
        if page.index == self.cancel_on_page {
            self.token.cancel();
        }
        Ok(vec![
            text_box(page.index, 0.0, 0.0, 90.0, 20.0, 0.9),
            text_box(page.index, 0.0, 50.0, 90.0, 70.0, 0.8),
        ])
    }

    fn name(&self) -> &str {
        "cancelling"
    }
}

#[test]
fn test_cancel_during_detection_skips_recognition() {
    let token = CancellationToken::new();
    let recognizer = Arc::new(SizeReader::new());
    let pipeline = DocumentPipeline::builder()
        .rasterizer(Arc::new(BlankPages::new(1)))
        .detector(Arc::new(CancellingDetector {
            cancel_on_page: 0,
            token: token.clone(),
        }))
        .recognizer(recognizer.clone())
        .build()
        .unwrap();

    let result = pipeline
        .process_with_cancel(b"doc", &PipelineOptions::default(), &token)
        .unwrap();

    assert_eq!(result.status, DocumentStatus::Partial);
    assert_eq!(result.regions.len(), 2);
    assert!(result
        .regions
        .iter()
        .all(|r| r.error == Some(FailureKind::Cancelled) && r.text.is_empty()));
    assert_eq!(result.errors.len(), 2);
    for failure in &result.errors {
        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert_eq!(failure.page_index, 0);
        assert!(failure.region_id.is_some());
        assert_eq!(failure.attempts, 0);
    }
    assert_eq!(recognizer.calls(), 0);
}

#[test]
fn test_cancel_on_first_page_skips_later_pages() {
    let token = CancellationToken::new();
    let recognizer = Arc::new(SizeReader::new());
    let pipeline = DocumentPipeline::builder()
        .rasterizer(Arc::new(BlankPages::new(3)))
        .detector(Arc::new(CancellingDetector {
            cancel_on_page: 0,
            token: token.clone(),
        }))
        .recognizer(recognizer.clone())
        .parallel_policy(ParallelPolicy::new().with_page_workers(Some(1)))
        .build()
        .unwrap();

    let result = pipeline
        .process_with_cancel(b"doc", &PipelineOptions::default(), &token)
        .unwrap();

    // Page 0 keeps its regions; the pages after it are never detected.
    assert_eq!(result.status, DocumentStatus::Partial);
    assert!(result.regions.iter().all(|r| r.region.page_index == 0));
    assert_eq!(result.regions.len(), 2);
    let page_failures: Vec<usize> = result
        .errors
        .iter()
        .filter(|f| f.region_id.is_none())
        .map(|f| f.page_index)
        .collect();
    assert_eq!(page_failures, vec![1, 2]);
    assert!(result.errors.iter().all(|f| f.kind == FailureKind::Cancelled && f.attempts == 0));
    assert_eq!(recognizer.calls(), 0);
}

#[test]
fn test_unsupported_language_skips_ocr() {
    let detector = Arc::new(ScriptedDetector::new([(
        0,
        vec![
            text_box(0, 0.0, 0.0, 90.0, 20.0, 0.9),
            text_box(0, 0.0, 50.0, 90.0, 70.0, 0.9),
        ],
    )]));
    let mut reader = SizeReader::new();
    reader.supported = Some(vec!["eng".to_string()]);
    let recognizer = Arc::new(reader);
    let pipeline = pipeline(Arc::new(BlankPages::new(1)), detector, recognizer.clone());

    let options = PipelineOptions::default()
        .with_languages(["eng", "xyz"])
        .with_max_ocr_retries(3);
    let result = pipeline.process(b"doc", &options).unwrap();

    assert_eq!(result.regions.len(), 2);
    assert!(result
        .regions
        .iter()
        .all(|r| r.error == Some(FailureKind::UnsupportedLanguage)));
    assert!(result.errors.iter().all(|f| f.attempts == 0));
    assert!(result.errors[0].message.contains("xyz"));
    assert_eq!(recognizer.calls(), 0);
}

#[test]
fn test_engine_language_rejection_is_not_retried() {
    let detector = Arc::new(ScriptedDetector::new([(
        0,
        vec![text_box(0, 0.0, 0.0, 90.0, 20.0, 0.9)],
    )]));
    let mut reader = SizeReader::new();
    reader.reject_language = Some("fra".to_string());
    let recognizer = Arc::new(reader);
    let pipeline = pipeline(Arc::new(BlankPages::new(1)), detector, recognizer.clone());

    let result = pipeline
        .process(b"doc", &PipelineOptions::default().with_max_ocr_retries(3))
        .unwrap();

    assert_eq!(result.regions[0].error, Some(FailureKind::UnsupportedLanguage));
    assert_eq!(result.errors[0].attempts, 1);
    assert_eq!(recognizer.calls(), 1);
}

#[test]
fn test_zero_pages_is_unreadable() {
    let rasterizer = Arc::new(BlankPages {
        sizes: Vec::new(),
        calls: AtomicUsize::new(0),
    });
    let detector = Arc::new(ScriptedDetector::empty());
    let pipeline = pipeline(rasterizer, detector.clone(), Arc::new(SizeReader::new()));

    let err = pipeline
        .process(b"doc", &PipelineOptions::default())
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnreadableDocument { .. }));
    assert_eq!(err.status_class(), StatusClass::Client);
    assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_empty_page_image_is_unreadable() {
    let rasterizer = Arc::new(BlankPages {
        sizes: vec![(200, 100), (0, 0)],
        calls: AtomicUsize::new(0),
    });
    let detector = Arc::new(ScriptedDetector::empty());
    let pipeline = pipeline(rasterizer, detector.clone(), Arc::new(SizeReader::new()));

    let err = pipeline
        .process(b"doc", &PipelineOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::UnreadableDocument { source: None, .. }
    ));
    assert!(err.to_string().contains("page 2"));
    assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_rasterizer_failure_is_unreadable() {
    let pipeline = pipeline(
        Arc::new(BlankPages::new(1)),
        Arc::new(ScriptedDetector::empty()),
        Arc::new(SizeReader::new()),
    );

    let err = pipeline.process(b"", &PipelineOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::UnreadableDocument {
            source: Some(RasterizeError::Load(_)),
            ..
        }
    ));
}

#[test]
fn test_invalid_options_fail_before_rasterizing() {
    let rasterizer = Arc::new(BlankPages::new(1));
    let pipeline = pipeline(
        rasterizer.clone(),
        Arc::new(ScriptedDetector::empty()),
        Arc::new(SizeReader::new()),
    );

    let options = PipelineOptions::default().with_iou_threshold(0.0);
    let err = pipeline.process(b"doc", &options).unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError { .. }));
    assert_eq!(err.status_class(), StatusClass::Server);
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_builder_requires_every_collaborator() {
    let err = DocumentPipeline::builder()
        .rasterizer(Arc::new(BlankPages::new(1)))
        .detector(Arc::new(ScriptedDetector::empty()))
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("no text recognizer"));
}
