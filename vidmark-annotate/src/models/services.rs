//! Encoder and predictor traits

use crate::error::{AnnotateError, Result};
use crate::mask::Mask;
use async_trait::async_trait;
use image::DynamicImage;
use vidmark_core::Point;

/// Dense float tensor with an explicit shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))
            .ok_or_else(|| AnnotateError::EncodingFailure("Tensor shape overflows".to_string()))?;
        if expected != data.len() {
            return Err(AnnotateError::EncodingFailure(format!(
                "Tensor shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// Per-frame feature embedding. Opaque to the engine; only the predictor
/// interprets it.
pub type Embedding = Tensor;

/// A point prompt in model input coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPoint {
    pub x: f32,
    pub y: f32,
    /// 1.0 foreground, 0.0 background
    pub label: f32,
}

impl ModelPoint {
    pub fn from_point(point: &Point, x: f64, y: f64) -> Self {
        Self {
            x: x as f32,
            y: y as f32,
            label: point.label.as_model_label(),
        }
    }
}

/// Computes a frame embedding.
#[async_trait]
pub trait ImageEncoder: Send + Sync {
    fn name(&self) -> &str;

    async fn encode(&self, image: &DynamicImage) -> Result<Embedding>;
}

/// Turns an embedding plus point prompts into a dense mask on the model's
/// fixed output grid.
#[async_trait]
pub trait MaskPredictor: Send + Sync {
    fn name(&self) -> &str;

    async fn predict(
        &self,
        embedding: &Embedding,
        points: &[ModelPoint],
        image_height: u32,
        image_width: u32,
    ) -> Result<Mask>;
}
