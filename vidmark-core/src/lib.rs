pub mod types;
pub mod error;
pub mod config;

pub use error::{Error, Result};
pub use config::{
    AnnotatorConfig, CatalogConfig, FramesConfig, ModelConfig, ReviewConfig, TrackingConfig,
};
pub use types::{BBox, Dimensions, FrameIndex, Point, PointLabel};
