//! Mask transport codec.
//!
//! A mask travels as base64 over a JSON document:
//! `{"encoding": [[value, run], ...], "width": W, "height": H}` where the runs
//! cover the thresholded bitmap in row-major order.

use crate::error::{AnnotateError, Result};
use crate::mask::{cell_count, Bitmap, Mask};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Values above this are foreground on the wire.
pub const TRANSPORT_THRESHOLD: f32 = 0.5;

/// Run-length encoded binary mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RleMask {
    pub encoding: Vec<(u8, usize)>,
    pub width: usize,
    pub height: usize,
}

impl RleMask {
    pub fn from_bitmap(bitmap: &Bitmap) -> Self {
        let mut encoding: Vec<(u8, usize)> = Vec::new();
        for bit in bitmap.bits() {
            let value = u8::from(*bit);
            match encoding.last_mut() {
                Some((current, run)) if *current == value => *run += 1,
                _ => encoding.push((value, 1)),
            }
        }

        Self {
            encoding,
            width: bitmap.width(),
            height: bitmap.height(),
        }
    }

    /// Expand the runs, checking they cover exactly `width * height` cells.
    pub fn to_bitmap(&self) -> Result<Bitmap> {
        let total = cell_count(self.width, self.height)?;

        let mut bits = Vec::with_capacity(total);
        for &(value, run) in &self.encoding {
            let bit = match value {
                0 => false,
                1 => true,
                other => {
                    return Err(AnnotateError::Codec(format!("Invalid run value {}", other)))
                }
            };
            if run == 0 {
                return Err(AnnotateError::Codec("Zero-length run".to_string()));
            }
            if bits.len() + run > total {
                return Err(AnnotateError::Codec(format!(
                    "Runs exceed {}x{} grid",
                    self.width, self.height
                )));
            }
            bits.extend(std::iter::repeat(bit).take(run));
        }

        if bits.len() != total {
            return Err(AnnotateError::Codec(format!(
                "Runs cover {} cells, expected {}",
                bits.len(),
                total
            )));
        }

        Bitmap::new(self.width, self.height, bits)
    }

    /// JSON then base64.
    pub fn to_transport(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    pub fn from_transport(encoded: &str) -> Result<Self> {
        let json = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AnnotateError::Codec(format!("Invalid base64: {}", e)))?;
        serde_json::from_slice(&json)
            .map_err(|e| AnnotateError::Codec(format!("Invalid mask document: {}", e)))
    }
}

/// Threshold, run-length encode and serialize a dense mask for transmission.
pub fn compress_mask(mask: &Mask) -> Result<String> {
    compress_mask_with(mask, TRANSPORT_THRESHOLD)
}

pub fn compress_mask_with(mask: &Mask, threshold: f32) -> Result<String> {
    RleMask::from_bitmap(&mask.binarize(threshold)).to_transport()
}

/// Reverse of [`compress_mask`] for the thresholded bitmap.
pub fn decompress_mask(encoded: &str) -> Result<Bitmap> {
    RleMask::from_transport(encoded)?.to_bitmap()
}
