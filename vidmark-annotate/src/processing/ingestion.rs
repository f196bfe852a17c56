//! Tracking response validation and ingestion

use crate::error::{AnnotateError, Result};
use crate::video::{IngestReport, Video};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};
use vidmark_core::BBox;

/// One validated `(frame label, bbox)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingEntry {
    pub frame_label: String,
    pub bbox: BBox,
}

/// Validated form of a tracking backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingResult {
    pub space_name: Option<String>,
    pub object_id: String,
    pub entries: Vec<TrackingEntry>,
    /// Entries dropped because they did not validate
    pub malformed: usize,
}

fn field<'a>(value: &'a Value, snake: &str, camel: &str) -> Option<&'a Value> {
    value.get(snake).or_else(|| value.get(camel))
}

fn parse_entry(entry: &Value) -> Option<TrackingEntry> {
    let frame_label = field(entry, "frame", "frame_name")?.as_str()?.to_string();
    let coords: Vec<f64> = entry
        .get("bbox")?
        .as_array()?
        .iter()
        .map(Value::as_f64)
        .collect::<Option<_>>()?;
    let bbox = BBox::from_slice(&coords)?;
    Some(TrackingEntry { frame_label, bbox })
}

/// Validate a loosely typed response. The object id and results list are
/// required; individual entries that fail validation are skipped and counted.
pub fn parse_response(value: &Value) -> Result<TrackingResult> {
    if !value.is_object() {
        return Err(AnnotateError::MalformedResponse(
            "Response is not an object".to_string(),
        ));
    }

    let object_id = field(value, "object_id", "objectId")
        .and_then(Value::as_str)
        .ok_or_else(|| AnnotateError::MalformedResponse("Missing object_id".to_string()))?
        .to_string();

    let space_name = field(value, "space_name", "spaceName")
        .and_then(Value::as_str)
        .map(str::to_string);

    let results = value
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| AnnotateError::MalformedResponse("Missing results list".to_string()))?;

    let mut entries = Vec::with_capacity(results.len());
    let mut malformed = 0;
    for raw in results {
        match parse_entry(raw) {
            Some(entry) => entries.push(entry),
            None => {
                warn!("Skipping malformed tracking entry for {}: {}", object_id, raw);
                malformed += 1;
            }
        }
    }

    Ok(TrackingResult {
        space_name,
        object_id,
        entries,
        malformed,
    })
}

pub fn parse_response_str(body: &str) -> Result<TrackingResult> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AnnotateError::MalformedResponse(format!("Invalid JSON: {}", e)))?;
    parse_response(&value)
}

/// Parse and apply a response to `video`, recording the round-trip duration.
pub fn ingest_response(video: &Video, response: &Value, duration: Duration) -> Result<IngestReport> {
    let result = parse_response(response)?;
    let report = video.apply_tracking(&result, duration)?;
    info!(
        "Ingested {} boxes for {} in {:.2}s ({} unresolved labels, {} malformed)",
        report.applied,
        report.object_id,
        duration.as_secs_f64(),
        report.skipped_labels.len(),
        report.malformed
    );
    Ok(report)
}
