//! Coordinate transforms between the display surface, normalized image space
//! and the segmentation model's square input frame.

use vidmark_core::Dimensions;

/// Uniform fit of an image centered inside a display surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    image: Dimensions,
}

impl Letterbox {
    /// Compute the fit, or `None` when either size is degenerate.
    pub fn fit(surface: Dimensions, image: Dimensions) -> Option<Self> {
        if surface.is_empty() || image.is_empty() {
            return None;
        }

        let scale = (surface.width / image.width).min(surface.height / image.height);
        Some(Self {
            scale,
            offset_x: (surface.width - image.width * scale) / 2.0,
            offset_y: (surface.height - image.height * scale) / 2.0,
            image,
        })
    }

    /// Display pixels to normalized image coordinates. Points outside the
    /// projected image rectangle come back outside `[0, 1]`.
    pub fn display_to_image(&self, px: f64, py: f64) -> (f64, f64) {
        (
            (px - self.offset_x) / (self.image.width * self.scale),
            (py - self.offset_y) / (self.image.height * self.scale),
        )
    }

    pub fn image_to_display(&self, nx: f64, ny: f64) -> (f64, f64) {
        (
            nx * self.image.width * self.scale + self.offset_x,
            ny * self.image.height * self.scale + self.offset_y,
        )
    }

    /// Projected image rectangle on the surface as `(x, y, width, height)`.
    pub fn projected_rect(&self) -> (f64, f64, f64, f64) {
        (
            self.offset_x,
            self.offset_y,
            self.image.width * self.scale,
            self.image.height * self.scale,
        )
    }
}

pub fn display_to_image(
    surface: Dimensions,
    image: Dimensions,
    px: f64,
    py: f64,
) -> Option<(f64, f64)> {
    Letterbox::fit(surface, image).map(|fit| fit.display_to_image(px, py))
}

pub fn image_to_display(
    surface: Dimensions,
    image: Dimensions,
    nx: f64,
    ny: f64,
) -> Option<(f64, f64)> {
    Letterbox::fit(surface, image).map(|fit| fit.image_to_display(nx, ny))
}

/// Per-axis pixel → model factors.
///
/// The long side maps to `model_edge`; the short side is additionally scaled by
/// the aspect ratio so both axes span the full square input the encoder sees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelScale {
    pub x: f64,
    pub y: f64,
}

impl ModelScale {
    pub fn new(image: Dimensions, model_edge: f64) -> Option<Self> {
        if image.is_empty() || !(model_edge > 0.0) {
            return None;
        }

        let long_side = image.width.max(image.height);
        let base = model_edge / long_side;
        let mut factors = Self { x: base, y: base };
        if image.height < image.width {
            factors.y *= image.width / image.height;
        } else {
            factors.x *= image.height / image.width;
        }
        Some(factors)
    }
}

/// Normalized image coordinates to model input coordinates.
pub fn image_to_model(
    image: Dimensions,
    model_edge: f64,
    nx: f64,
    ny: f64,
) -> Option<(f64, f64)> {
    let factors = ModelScale::new(image, model_edge)?;
    Some((nx * image.width * factors.x, ny * image.height * factors.y))
}

/// Model input coordinates back to normalized image coordinates.
pub fn model_to_image(
    image: Dimensions,
    model_edge: f64,
    mx: f64,
    my: f64,
) -> Option<(f64, f64)> {
    let factors = ModelScale::new(image, model_edge)?;
    Some((mx / (image.width * factors.x), my / (image.height * factors.y)))
}
