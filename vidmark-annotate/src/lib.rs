//! vidmark-annotate: interactive video object annotation
//!
//! Point-prompted segmentation on individual frames, confirmation of the
//! resulting masks, and ingestion of the per-frame boxes a tracking backend
//! propagates through the rest of the video.

pub mod annotation;
pub mod cache;
pub mod catalog;
pub mod codec;
pub mod error;
pub mod frames;
pub mod mask;
pub mod models;
pub mod navigation;
pub mod processing;
pub mod session;
pub mod tracking;
pub mod transform;
pub mod video;

pub use annotation::{Annotation, FrameBox, LifecycleState, PredictionTicket};
pub use cache::EncodingCache;
pub use catalog::{ObjectType, TypeCatalog};
pub use codec::{compress_mask, decompress_mask, RleMask};
pub use error::{AnnotateError, Result};
pub use frames::{DirectoryFrameSource, FrameSource, FrameUrls, HttpFrameSource};
pub use mask::{Bitmap, Mask};
pub use models::{Embedding, ImageEncoder, MaskPredictor, ModelPoint};
pub use navigation::{FrameCursor, FrameNavigator, ReviewPlayer};
pub use processing::{PredictionOrchestrator, TrackingResult};
pub use session::{AnnotationSession, SessionServices, SessionSummary};
pub use tracking::{HttpTrackingBackend, TrackingBackend, TrackingRequest};
pub use video::{BoxEntry, IngestReport, Video, VideoInfo};
