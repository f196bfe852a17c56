//! Cross-crate scenarios over the public API

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use vidmark_annotate::models::Tensor;
use vidmark_annotate::processing::ingest_response;
use vidmark_annotate::{
    AnnotateError, Annotation, Embedding, EncodingCache, ImageEncoder, Mask, Result, Video,
};
use vidmark_core::{BBox, Point};

fn labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("f{:04}.jpg", i)).collect()
}

fn confirmed(frame: usize, object_type: &str, index: usize) -> Annotation {
    let mut annotation = Annotation::new(frame, object_type, 0, index, "#3cb44b");
    annotation.add_point(Point::positive(0.4, 0.6)).unwrap();
    annotation.set_mask(Mask::filled(4, 4, 1.0).unwrap()).unwrap();
    annotation.confirm().unwrap();
    annotation
}

#[test]
fn test_tracking_response_lands_on_annotation() {
    let video = Video::new("lobby", labels(10)).unwrap();
    video.add_annotation(confirmed(3, "obj", 1)).unwrap();

    let response = json!({
        "objectId": "obj_1",
        "results": [{"frame": "f0005.jpg", "bbox": [0.1, 0.1, 0.4, 0.4]}]
    });
    let report = ingest_response(&video, &response, Duration::from_secs(2)).unwrap();
    assert_eq!(report.applied, 1);

    let annotation = video.annotation("obj_1").unwrap();
    assert_eq!(annotation.bounding_boxes().len(), 1);
    assert_eq!(annotation.bounding_boxes()[0].frame_index, 5);
    assert_eq!(annotation.bounding_boxes()[0].bbox, BBox::new(0.1, 0.1, 0.4, 0.4));
    assert!(annotation.is_processed());
    assert_eq!(annotation.processing_duration(), Duration::from_secs(2));

    let entries = video.boxes_for_frame(5);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].annotation_id, "obj_1");
}

#[test]
fn test_tracking_response_failures_are_local() {
    let video = Video::new("lobby", labels(10)).unwrap();
    video.add_annotation(confirmed(3, "obj", 1)).unwrap();

    let unknown = json!({"object_id": "obj_2", "results": [{"frame": "f0005.jpg", "bbox": [0.1, 0.1, 0.4, 0.4]}]});
    assert!(matches!(
        ingest_response(&video, &unknown, Duration::ZERO),
        Err(AnnotateError::UnknownObjectId(_))
    ));

    let malformed = json!({"object_id": "obj_1", "results": "nope"});
    assert!(matches!(
        ingest_response(&video, &malformed, Duration::ZERO),
        Err(AnnotateError::MalformedResponse(_))
    ));

    // the video remains usable
    let good = json!({"object_id": "obj_1", "results": [{"frame": "f0009.jpg", "bbox": [0.0, 0.0, 1.0, 1.0]}]});
    assert!(ingest_response(&video, &good, Duration::ZERO).is_ok());
    assert_eq!(video.boxes_for_frame(9).len(), 1);
    assert!(video.boxes_for_frame(5).is_empty());
}

#[test]
fn test_later_prediction_wins() {
    let mut draft = Annotation::new(0, "Door", 0, 1, "#e6194b");
    draft.add_point(Point::positive(0.1, 0.1)).unwrap();
    let r1 = draft.issue_ticket().unwrap();
    draft.add_point(Point::positive(0.2, 0.2)).unwrap();
    let r2 = draft.issue_ticket().unwrap();

    let m2 = Mask::filled(2, 2, 0.8).unwrap();
    assert!(draft.apply_prediction(&r2, m2.clone()).unwrap());
    assert!(!draft.apply_prediction(&r1, Mask::filled(2, 2, 0.1).unwrap()).unwrap());
    assert_eq!(draft.mask(), Some(&m2));
}

#[test]
fn test_confirmed_annotation_is_frozen() {
    let mut annotation = confirmed(1, "Ramp", 1);
    let points = annotation.points().to_vec();
    let mask = annotation.mask().cloned();

    assert!(matches!(
        annotation.add_point(Point::negative(0.9, 0.9)),
        Err(AnnotateError::ConfirmationViolation(_))
    ));
    assert!(matches!(
        annotation.set_mask(Mask::filled(4, 4, 0.0).unwrap()),
        Err(AnnotateError::ConfirmationViolation(_))
    ));
    assert_eq!(annotation.points(), points.as_slice());
    assert_eq!(annotation.mask().cloned(), mask);
}

struct SlowEncoder {
    calls: AtomicUsize,
    release: Notify,
}

#[async_trait]
impl ImageEncoder for SlowEncoder {
    fn name(&self) -> &str {
        "slow"
    }

    async fn encode(&self, _image: &DynamicImage) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Tensor::new(vec![1, 1], vec![0.5])
    }
}

#[tokio::test]
async fn test_two_waiters_one_encode() {
    let cache = Arc::new(EncodingCache::new());
    let encoder = Arc::new(SlowEncoder {
        calls: AtomicUsize::new(0),
        release: Notify::new(),
    });
    let image = Arc::new(DynamicImage::ImageRgb8(RgbImage::new(16, 16)));

    let spawn = || {
        let cache = Arc::clone(&cache);
        let encoder = Arc::clone(&encoder);
        let image = Arc::clone(&image);
        tokio::spawn(async move { cache.ensure(4, &image, encoder.as_ref()).await })
    };
    let a = spawn();
    let b = spawn();

    while encoder.calls.load(Ordering::SeqCst) == 0 || !cache.is_pending(4) {
        tokio::task::yield_now().await;
    }
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    encoder.release.notify_one();

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
}
