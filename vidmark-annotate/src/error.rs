//! Error types for vidmark-annotate

use thiserror::Error;
use vidmark_core::Error as CoreError;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Frame index {index} out of range (video has {frame_count} frames)")]
    OutOfRangeFrame { index: usize, frame_count: usize },

    #[error("Encoding failed: {0}")]
    EncodingFailure(String),

    #[error("Prediction failed: {0}")]
    PredictionFailure(String),

    #[error("Annotation {0} is confirmed and can no longer be changed")]
    ConfirmationViolation(String),

    #[error("Unresolved frame label: {0}")]
    UnresolvedFrameLabel(String),

    #[error("Unknown object id: {0}")]
    UnknownObjectId(String),

    #[error("Response is for video '{actual}', expected '{expected}'")]
    VideoMismatch { expected: String, actual: String },

    #[error("Malformed tracking response: {0}")]
    MalformedResponse(String),

    #[error("No frame selected")]
    NoCurrentFrame,

    #[error("No annotation in progress")]
    NoActiveDraft,

    #[error("Annotation was started on frame {draft_frame}, current frame is {current}")]
    DraftOnOtherFrame { draft_frame: usize, current: usize },

    #[error("Point ({x:.3}, {y:.3}) lies outside the image")]
    PointOutsideImage { x: f64, y: f64 },

    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),

    #[error("Annotation {0} has no mask to submit")]
    MissingMask(String),

    #[error("Unknown object type: {0}")]
    UnknownObjectType(String),

    #[error("Object type already exists: {0}")]
    DuplicateObjectType(String),

    #[error("Mask codec error: {0}")]
    Codec(String),

    #[error("Tracking error: {0}")]
    Tracking(String),

    #[error("Frame source error: {0}")]
    FrameSource(String),

    #[error("Review playback already running")]
    ReviewActive,

    #[error("No Tokio runtime available for {0}")]
    NoRuntime(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl AnnotateError {
    /// Whether re-triggering the same user action may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AnnotateError::EncodingFailure(_)
                | AnnotateError::PredictionFailure(_)
                | AnnotateError::Tracking(_)
                | AnnotateError::FrameSource(_)
                | AnnotateError::Network(_)
                | AnnotateError::Io(_)
        )
    }
}

impl From<AnnotateError> for CoreError {
    fn from(err: AnnotateError) -> Self {
        match err {
            AnnotateError::Core(inner) => inner,
            other => CoreError::Annotation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnotateError>;
