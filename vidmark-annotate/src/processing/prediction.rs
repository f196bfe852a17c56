//! Point-prompted mask prediction pipeline

use crate::error::{AnnotateError, Result};
use crate::mask::Mask;
use crate::models::{ImageEncoder, MaskPredictor, ModelPoint};
use crate::transform::image_to_model;
use crate::video::Video;
use image::DynamicImage;
use std::sync::Arc;
use tracing::debug;
use vidmark_core::{Dimensions, FrameIndex, Point};

/// Encodes the frame (through the video's cache) and runs the predictor on
/// the transformed points.
pub struct PredictionOrchestrator {
    encoder: Arc<dyn ImageEncoder>,
    predictor: Arc<dyn MaskPredictor>,
    model_edge: f64,
}

impl PredictionOrchestrator {
    pub fn new(
        encoder: Arc<dyn ImageEncoder>,
        predictor: Arc<dyn MaskPredictor>,
        model_edge: f64,
    ) -> Self {
        Self {
            encoder,
            predictor,
            model_edge,
        }
    }

    pub fn encoder(&self) -> &Arc<dyn ImageEncoder> {
        &self.encoder
    }

    /// Map normalized points into the model's input frame.
    pub fn model_points(&self, image: Dimensions, points: &[Point]) -> Result<Vec<ModelPoint>> {
        points
            .iter()
            .map(|p| {
                image_to_model(image, self.model_edge, p.x, p.y)
                    .map(|(mx, my)| ModelPoint::from_point(p, mx, my))
                    .ok_or_else(|| {
                        AnnotateError::PredictionFailure(format!(
                            "Cannot map points into a {}x{} image",
                            image.width, image.height
                        ))
                    })
            })
            .collect()
    }

    /// Warm the cache for `frame` without predicting.
    pub async fn prepare(&self, video: &Video, frame: FrameIndex, image: &DynamicImage) -> Result<()> {
        video.check_frame(frame)?;
        video.cache().ensure(frame, image, self.encoder.as_ref()).await?;
        Ok(())
    }

    pub async fn predict(
        &self,
        video: &Video,
        frame: FrameIndex,
        image: &DynamicImage,
        points: &[Point],
    ) -> Result<Mask> {
        video.check_frame(frame)?;
        if points.is_empty() {
            return Err(AnnotateError::InvalidAnnotation(
                "Prediction needs at least one point".to_string(),
            ));
        }

        let embedding = video
            .cache()
            .ensure(frame, image, self.encoder.as_ref())
            .await?;

        let dims = Dimensions::new(image.width() as f64, image.height() as f64);
        let model_points = self.model_points(dims, points)?;

        debug!(
            "Predicting mask on frame {} from {} points with {}",
            frame,
            model_points.len(),
            self.predictor.name()
        );
        self.predictor
            .predict(&embedding, &model_points, image.height(), image.width())
            .await
            .map_err(|e| match e {
                AnnotateError::PredictionFailure(_) => e,
                other => AnnotateError::PredictionFailure(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Embedding, Tensor};
    use async_trait::async_trait;
    use image::RgbImage;
    use parking_lot::Mutex;

    struct ConstEncoder;

    #[async_trait]
    impl ImageEncoder for ConstEncoder {
        fn name(&self) -> &str {
            "const"
        }

        async fn encode(&self, _image: &DynamicImage) -> Result<Embedding> {
            Tensor::new(vec![1], vec![7.0])
        }
    }

    #[derive(Default)]
    struct RecordingPredictor {
        seen: Mutex<Vec<(Vec<ModelPoint>, u32, u32)>>,
        fail: bool,
    }

    #[async_trait]
    impl MaskPredictor for RecordingPredictor {
        fn name(&self) -> &str {
            "recording"
        }

        async fn predict(
            &self,
            embedding: &Embedding,
            points: &[ModelPoint],
            image_height: u32,
            image_width: u32,
        ) -> Result<Mask> {
            assert_eq!(embedding.data(), &[7.0]);
            if self.fail {
                return Err(AnnotateError::Codec("bad output".to_string()));
            }
            self.seen
                .lock()
                .push((points.to_vec(), image_height, image_width));
            Mask::filled(4, 4, 1.0)
        }
    }

    fn setup(fail: bool) -> (PredictionOrchestrator, Arc<RecordingPredictor>, Video) {
        let predictor = Arc::new(RecordingPredictor {
            fail,
            ..Default::default()
        });
        let orchestrator = PredictionOrchestrator::new(
            Arc::new(ConstEncoder),
            predictor.clone() as Arc<dyn MaskPredictor>,
            1024.0,
        );
        let video = Video::new("v", vec!["a.jpg".to_string(), "b.jpg".to_string()]).unwrap();
        (orchestrator, predictor, video)
    }

    #[tokio::test]
    async fn test_predict_transforms_points() {
        let (orchestrator, predictor, video) = setup(false);
        let image = DynamicImage::ImageRgb8(RgbImage::new(200, 100));
        let points = [Point::positive(0.5, 0.25), Point::negative(1.0, 1.0)];

        let mask = orchestrator.predict(&video, 1, &image, &points).await.unwrap();
        assert_eq!(mask.width(), 4);
        assert!(video.cache().contains(1));

        let seen = predictor.seen.lock();
        let (model_points, h, w) = &seen[0];
        assert_eq!((*h, *w), (100, 200));
        assert_eq!((model_points[0].x, model_points[0].y), (512.0, 256.0));
        assert_eq!(model_points[0].label, 1.0);
        assert_eq!((model_points[1].x, model_points[1].y), (1024.0, 1024.0));
        assert_eq!(model_points[1].label, 0.0);
    }

    #[tokio::test]
    async fn test_predict_rejects_bad_input() {
        let (orchestrator, _, video) = setup(false);
        let image = DynamicImage::ImageRgb8(RgbImage::new(20, 10));
        assert!(matches!(
            orchestrator
                .predict(&video, 5, &image, &[Point::positive(0.5, 0.5)])
                .await,
            Err(AnnotateError::OutOfRangeFrame { .. })
        ));
        assert!(orchestrator.predict(&video, 0, &image, &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_predictor_errors_become_prediction_failures() {
        let (orchestrator, _, video) = setup(true);
        let image = DynamicImage::ImageRgb8(RgbImage::new(20, 10));
        let err = orchestrator
            .predict(&video, 0, &image, &[Point::positive(0.5, 0.5)])
            .await
            .unwrap_err();
        assert!(matches!(err, AnnotateError::PredictionFailure(_)));
        // the embedding is still cached
        assert!(video.cache().contains(0));
    }
}
