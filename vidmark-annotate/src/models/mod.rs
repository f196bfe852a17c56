//! Encoding and prediction service seams

pub mod preprocess;
pub mod services;

pub use preprocess::image_to_tensor;
pub use services::{Embedding, ImageEncoder, MaskPredictor, ModelPoint, Tensor};
