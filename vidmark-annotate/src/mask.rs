//! Dense segmentation masks and their thresholded bitmaps

use crate::error::{AnnotateError, Result};
use std::io::Write;
use vidmark_core::BBox;

/// Largest mask, in cells, that will be allocated.
pub const MAX_CELLS: usize = 1 << 28;

pub(crate) fn cell_count(width: usize, height: usize) -> Result<usize> {
    match width.checked_mul(height) {
        Some(cells) if cells <= MAX_CELLS => Ok(cells),
        _ => Err(AnnotateError::Codec(format!(
            "Mask size {}x{} exceeds {} cells",
            width, height, MAX_CELLS
        ))),
    }
}

/// Dense mask on the prediction service's fixed grid, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Mask {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| AnnotateError::InvalidAnnotation("Mask dimensions overflow".to_string()))?;
        if data.len() != expected {
            return Err(AnnotateError::InvalidAnnotation(format!(
                "Mask data has {} values, expected {}x{}={}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Result<Self> {
        let cells = cell_count(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![value; cells],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.data.get(row * self.width + col).copied()
    }

    /// Sample at normalized image coordinates; `None` outside the unit square.
    pub fn sample(&self, nx: f64, ny: f64) -> Option<f32> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        if !(0.0..=1.0).contains(&nx) || !(0.0..=1.0).contains(&ny) {
            return None;
        }
        let col = ((nx * self.width as f64) as usize).min(self.width - 1);
        let row = ((ny * self.height as f64) as usize).min(self.height - 1);
        self.get(col, row)
    }

    /// Threshold into a binary bitmap. NaN counts as background.
    pub fn binarize(&self, threshold: f32) -> Bitmap {
        Bitmap {
            width: self.width,
            height: self.height,
            bits: self
                .data
                .iter()
                .map(|v| v.is_finite() && *v > threshold)
                .collect(),
        }
    }
}

impl From<&Bitmap> for Mask {
    /// Foreground becomes 1.0, background 0.0.
    fn from(bitmap: &Bitmap) -> Self {
        Self {
            width: bitmap.width,
            height: bitmap.height,
            data: bitmap
                .bits
                .iter()
                .map(|b| if *b { 1.0 } else { 0.0 })
                .collect(),
        }
    }
}

/// Binary mask, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Bitmap {
    pub fn new(width: usize, height: usize, bits: Vec<bool>) -> Result<Self> {
        if Some(bits.len()) != width.checked_mul(height) {
            return Err(AnnotateError::Codec(format!(
                "Bitmap has {} cells, expected {}x{}",
                bits.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, bits })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn foreground_count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    pub fn foreground_ratio(&self) -> f64 {
        if self.bits.is_empty() {
            return 0.0;
        }
        self.foreground_count() as f64 / self.bits.len() as f64
    }

    /// Nearest-neighbour resample, used to bring a model-grid mask to the
    /// image's native resolution.
    pub fn resize(&self, width: usize, height: usize) -> Result<Bitmap> {
        let cells = cell_count(width, height)?;
        if self.width == 0 || self.height == 0 {
            return Ok(Bitmap {
                width,
                height,
                bits: vec![false; cells],
            });
        }

        let mut bits = Vec::with_capacity(cells);
        for y in 0..height {
            let src_y = ((y as f64 + 0.5) * self.height as f64 / height as f64) as usize;
            let src_y = src_y.min(self.height - 1);
            for x in 0..width {
                let src_x = ((x as f64 + 0.5) * self.width as f64 / width as f64) as usize;
                let src_x = src_x.min(self.width - 1);
                bits.push(self.bits[src_y * self.width + src_x]);
            }
        }
        Ok(Bitmap { width, height, bits })
    }

    /// Tight normalized box around the foreground, `None` when empty.
    pub fn bounding_box(&self) -> Option<BBox> {
        let mut min_x = usize::MAX;
        let mut min_y = usize::MAX;
        let mut max_x = 0;
        let mut max_y = 0;
        let mut any = false;

        for (idx, _) in self.bits.iter().enumerate().filter(|(_, b)| **b) {
            let (x, y) = (idx % self.width, idx / self.width);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
            any = true;
        }

        if !any {
            return None;
        }

        let w = self.width as f64;
        let h = self.height as f64;
        Some(BBox::new(
            min_x as f64 / w,
            min_y as f64 / h,
            (max_x + 1) as f64 / w,
            (max_y + 1) as f64 / h,
        ))
    }

    /// Write as CSV: a `width,height` header, the dimensions, then one row per
    /// image row of 0/1 values.
    pub fn write_csv<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "width,height")?;
        writeln!(out, "{},{}", self.width, self.height)?;
        if self.width == 0 {
            return Ok(());
        }
        for row in self.bits.chunks(self.width) {
            let line: Vec<&str> = row.iter().map(|b| if *b { "1" } else { "0" }).collect();
            writeln!(out, "{}", line.join(","))?;
        }
        Ok(())
    }

    /// Parse the CSV layout produced by [`Bitmap::write_csv`].
    pub fn read_csv(content: &str) -> Result<Bitmap> {
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next().unwrap_or_default();
        if header.trim() != "width,height" {
            return Err(AnnotateError::Codec("Missing width,height header".to_string()));
        }

        let dims = lines
            .next()
            .ok_or_else(|| AnnotateError::Codec("Missing dimensions row".to_string()))?;
        let mut parts = dims.split(',').map(|p| p.trim().parse::<usize>());
        let (width, height) = match (parts.next(), parts.next()) {
            (Some(Ok(w)), Some(Ok(h))) => (w, h),
            _ => return Err(AnnotateError::Codec(format!("Bad dimensions row: {}", dims))),
        };

        let mut bits = Vec::with_capacity(width.saturating_mul(height));
        for line in lines {
            for cell in line.split(',') {
                match cell.trim() {
                    "0" => bits.push(false),
                    "1" => bits.push(true),
                    other => {
                        return Err(AnnotateError::Codec(format!("Bad mask cell: {}", other)))
                    }
                }
            }
        }
        Bitmap::new(width, height, bits)
    }
}
