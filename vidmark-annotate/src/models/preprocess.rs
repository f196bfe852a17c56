//! Image preprocessing for encoder implementations

use super::services::Tensor;
use crate::error::{AnnotateError, Result};
use image::imageops::FilterType;
use image::DynamicImage;

/// Largest accepted input edge.
const MAX_INPUT_SIZE: u32 = 4096;

/// Resample `image` to `size × size` (nearest neighbour), scale RGB to
/// `[-1, 1]` and lay it out as CHW with shape `[1, 3, size, size]`.
pub fn image_to_tensor(image: &DynamicImage, size: u32) -> Result<Tensor> {
    if size == 0 || size > MAX_INPUT_SIZE {
        return Err(AnnotateError::EncodingFailure(format!(
            "Encoder input size {} out of range (1..={})",
            size, MAX_INPUT_SIZE
        )));
    }
    if image.width() == 0 || image.height() == 0 {
        return Err(AnnotateError::EncodingFailure("Empty image".to_string()));
    }

    let resized = image.resize_exact(size, size, FilterType::Nearest).to_rgb8();
    let plane = (size as usize) * (size as usize);
    let mut data = vec![0.0f32; plane * 3];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = y as usize * size as usize + x as usize;
        for channel in 0..3 {
            data[channel * plane + offset] = pixel[channel] as f32 / 127.5 - 1.0;
        }
    }

    Tensor::new(vec![1, 3, size as usize, size as usize], data)
}
