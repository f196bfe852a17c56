use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based position of a frame within a video.
pub type FrameIndex = usize;

/// Whether a point prompt marks foreground or background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointLabel {
    Negative,
    Positive,
}

impl PointLabel {
    /// Label value the prediction service expects (1 foreground, 0 background).
    pub fn as_model_label(self) -> f32 {
        match self {
            PointLabel::Positive => 1.0,
            PointLabel::Negative => 0.0,
        }
    }

    pub fn is_positive(self) -> bool {
        self == PointLabel::Positive
    }
}

impl fmt::Display for PointLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointLabel::Positive => write!(f, "positive"),
            PointLabel::Negative => write!(f, "negative"),
        }
    }
}

/// A point prompt in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub label: PointLabel,
}

impl Point {
    pub fn new(x: f64, y: f64, label: PointLabel) -> Self {
        Self { x, y, label }
    }

    pub fn positive(x: f64, y: f64) -> Self {
        Self::new(x, y, PointLabel::Positive)
    }

    pub fn negative(x: f64, y: f64) -> Self {
        Self::new(x, y, PointLabel::Negative)
    }

    /// True when both coordinates lie inside the unit square.
    pub fn is_inside_image(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Axis-aligned box `[x1, y1, x2, y2]` in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build a box from a backend-provided slice, rejecting anything that is not
    /// four finite, ordered, normalized coordinates.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let [x1, y1, x2, y2]: [f64; 4] = values.try_into().ok()?;
        let bbox = Self::new(x1, y1, x2, y2);
        bbox.is_valid().then_some(bbox)
    }

    pub fn is_valid(&self) -> bool {
        let coords = [self.x1, self.y1, self.x2, self.y2];
        coords.iter().all(|c| c.is_finite() && (0.0..=1.0).contains(c))
            && self.x2 >= self.x1
            && self.y2 >= self.y1
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl From<[f64; 4]> for BBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        b.as_array()
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.4}, {:.4}, {:.4}, {:.4}]",
            self.x1, self.y1, self.x2, self.y2
        )
    }
}
