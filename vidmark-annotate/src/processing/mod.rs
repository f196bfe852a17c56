//! Prediction and tracking-ingestion pipelines

pub mod ingestion;
pub mod prediction;

pub use ingestion::{ingest_response, parse_response, parse_response_str, TrackingEntry, TrackingResult};
pub use prediction::PredictionOrchestrator;
