//! Service fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use vidmark_annotate::models::Tensor;
use vidmark_annotate::{
    AnnotateError, AnnotationSession, Embedding, FrameSource, ImageEncoder, Mask, MaskPredictor,
    ModelPoint, Result, SessionServices, TrackingBackend, TrackingRequest, Video,
};
use vidmark_core::AnnotatorConfig;

pub const IMAGE_WIDTH: u32 = 64;
pub const IMAGE_HEIGHT: u32 = 48;

pub fn frame_labels(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("f{:04}.jpg", i)).collect()
}

/// 4x4 mask with foreground in the lower-right quadrant.
pub fn quadrant_mask() -> Mask {
    let mut data = vec![0.0; 16];
    for (x, y) in [(2, 2), (3, 2), (2, 3), (3, 3)] {
        data[y * 4 + x] = 0.9;
    }
    Mask::new(4, 4, data).unwrap()
}

#[derive(Default)]
pub struct StaticFrames {
    pub fetches: AtomicUsize,
}

#[async_trait]
impl FrameSource for StaticFrames {
    async fn fetch(&self, _label: &str) -> Result<DynamicImage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(DynamicImage::ImageRgb8(RgbImage::new(IMAGE_WIDTH, IMAGE_HEIGHT)))
    }
}

#[derive(Default)]
pub struct CountingEncoder {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageEncoder for CountingEncoder {
    fn name(&self) -> &str {
        "counting"
    }

    async fn encode(&self, image: &DynamicImage) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Tensor::new(vec![2], vec![image.width() as f32, image.height() as f32])
    }
}

/// Answers immediately with [`quadrant_mask`] unless a gate was queued, in
/// which case the n-th call waits for the n-th gate.
#[derive(Default)]
pub struct FakePredictor {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub seen: Mutex<Vec<Vec<ModelPoint>>>,
    gates: Mutex<VecDeque<oneshot::Receiver<Mask>>>,
}

impl FakePredictor {
    pub fn gate(&self) -> oneshot::Sender<Mask> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push_back(rx);
        tx
    }
}

#[async_trait]
impl MaskPredictor for FakePredictor {
    fn name(&self) -> &str {
        "fake"
    }

    async fn predict(
        &self,
        _embedding: &Embedding,
        points: &[ModelPoint],
        _image_height: u32,
        _image_width: u32,
    ) -> Result<Mask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(points.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(AnnotateError::PredictionFailure("decoder crashed".to_string()));
        }
        let gate = self.gates.lock().pop_front();
        match gate {
            Some(rx) => rx
                .await
                .map_err(|_| AnnotateError::PredictionFailure("gate dropped".to_string())),
            None => Ok(quadrant_mask()),
        }
    }
}

/// Echoes the submitted object id back with a fixed result list.
pub struct FakeTracking {
    pub requests: Mutex<Vec<TrackingRequest>>,
    pub results: Vec<(String, [f64; 4])>,
    pub space_name: Option<String>,
    pub object_id: Option<String>,
}

impl FakeTracking {
    pub fn new(results: &[(&str, [f64; 4])]) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            results: results.iter().map(|(l, b)| (l.to_string(), *b)).collect(),
            space_name: None,
            object_id: None,
        }
    }
}

#[async_trait]
impl TrackingBackend for FakeTracking {
    async fn submit(&self, request: &TrackingRequest) -> Result<Value> {
        self.requests.lock().push(request.clone());
        let results: Vec<Value> = self
            .results
            .iter()
            .map(|(frame, bbox)| json!({"frame": frame, "bbox": bbox}))
            .collect();
        Ok(json!({
            "space_name": self.space_name.clone().unwrap_or_else(|| request.space_name.clone()),
            "object_id": self.object_id.clone().unwrap_or_else(|| request.object_id.clone()),
            "results": results,
        }))
    }
}

pub struct Harness {
    pub session: Arc<AnnotationSession>,
    pub encoder: Arc<CountingEncoder>,
    pub predictor: Arc<FakePredictor>,
    pub tracking: Arc<FakeTracking>,
    pub frames: Arc<StaticFrames>,
}

pub fn harness(frame_count: usize, tracking: FakeTracking) -> Harness {
    let encoder = Arc::new(CountingEncoder::default());
    let predictor = Arc::new(FakePredictor::default());
    let tracking = Arc::new(tracking);
    let frames = Arc::new(StaticFrames::default());

    let services = SessionServices {
        encoder: encoder.clone(),
        predictor: predictor.clone(),
        tracking: tracking.clone(),
        frames: frames.clone(),
    };
    let video = Video::new("lobby", frame_labels(frame_count)).unwrap();
    let session = Arc::new(AnnotationSession::new(
        video,
        AnnotatorConfig::default(),
        services,
    ));

    Harness {
        session,
        encoder,
        predictor,
        tracking,
        frames,
    }
}
