//! Annotation entity and its draft → confirmed lifecycle

use crate::error::{AnnotateError, Result};
use crate::mask::Mask;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;
use vidmark_core::{BBox, FrameIndex, Point, PointLabel};

/// One bounding box reported by the tracker for a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameBox {
    pub frame_index: FrameIndex,
    pub bbox: BBox,
}

/// Lifecycle stage derived from the annotation's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    DraftEmpty,
    DraftWithPoints,
    Confirmed,
}

/// Snapshot taken when a prediction is issued. The result may only be applied
/// while the annotation's latest issued generation still matches.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTicket {
    pub annotation_id: String,
    pub generation: u64,
    pub frame_index: FrameIndex,
    pub points: Vec<Point>,
}

/// A single annotated object instance.
#[derive(Debug, Clone)]
pub struct Annotation {
    id: String,
    object_type: String,
    color: String,
    overall_index: usize,
    type_index: usize,
    initial_frame: FrameIndex,
    points: Vec<Point>,
    mask: Option<Mask>,
    bounding_boxes: Vec<FrameBox>,
    processed: bool,
    processing_duration: Duration,
    confirmed: bool,
    created_at: DateTime<Utc>,
    generation: u64,
}

impl Annotation {
    pub fn new(
        initial_frame: FrameIndex,
        object_type: impl Into<String>,
        overall_index: usize,
        type_index: usize,
        color: impl Into<String>,
    ) -> Self {
        let object_type = object_type.into();
        Self {
            id: format!("{}_{}", object_type, type_index),
            object_type,
            color: color.into(),
            overall_index,
            type_index,
            initial_frame,
            points: Vec::new(),
            mask: None,
            bounding_boxes: Vec::new(),
            processed: false,
            processing_duration: Duration::ZERO,
            confirmed: false,
            created_at: Utc::now(),
            generation: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn overall_index(&self) -> usize {
        self.overall_index
    }

    pub fn type_index(&self) -> usize {
        self.type_index
    }

    pub fn initial_frame(&self) -> FrameIndex {
        self.initial_frame
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn positive_points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter().filter(|p| p.label.is_positive())
    }

    pub fn negative_points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter().filter(|p| !p.label.is_positive())
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn bounding_boxes(&self) -> &[FrameBox] {
        &self.bounding_boxes
    }

    /// Box reported for `frame_index`, if the tracker produced one.
    pub fn bbox_for_frame(&self, frame_index: FrameIndex) -> Option<BBox> {
        self.bounding_boxes
            .iter()
            .find(|b| b.frame_index == frame_index)
            .map(|b| b.bbox)
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    pub fn processing_duration(&self) -> Duration {
        self.processing_duration
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Valid once it has at least one positive point.
    pub fn is_valid(&self) -> bool {
        self.positive_points().next().is_some()
    }

    pub fn state(&self) -> LifecycleState {
        if self.confirmed {
            LifecycleState::Confirmed
        } else if self.points.is_empty() {
            LifecycleState::DraftEmpty
        } else {
            LifecycleState::DraftWithPoints
        }
    }

    /// Latest issued prediction generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.confirmed {
            return Err(AnnotateError::ConfirmationViolation(self.id.clone()));
        }
        Ok(())
    }

    /// Label a click at `(x, y)` would receive: negative over the current
    /// mask's foreground, positive otherwise (always positive without a mask).
    pub fn classify_point(&self, x: f64, y: f64, foreground_threshold: f32) -> PointLabel {
        match self.mask.as_ref().and_then(|m| m.sample(x, y)) {
            Some(value) if value > foreground_threshold => PointLabel::Negative,
            _ => PointLabel::Positive,
        }
    }

    pub fn add_point(&mut self, point: Point) -> Result<()> {
        self.ensure_mutable()?;
        self.points.push(point);
        Ok(())
    }

    /// Classify and append a click, returning the stored point.
    pub fn add_classified_point(
        &mut self,
        x: f64,
        y: f64,
        foreground_threshold: f32,
    ) -> Result<Point> {
        self.ensure_mutable()?;
        let point = Point::new(x, y, self.classify_point(x, y, foreground_threshold));
        self.points.push(point);
        Ok(point)
    }

    /// Drop all points and the mask, invalidating any outstanding prediction.
    pub fn clear_points(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.points.clear();
        self.mask = None;
        self.generation += 1;
        Ok(())
    }

    pub fn set_mask(&mut self, mask: Mask) -> Result<()> {
        self.ensure_mutable()?;
        self.mask = Some(mask);
        Ok(())
    }

    /// Start a prediction for the current point set. Any earlier ticket
    /// becomes stale.
    pub fn issue_ticket(&mut self) -> Result<PredictionTicket> {
        self.ensure_mutable()?;
        self.generation += 1;
        Ok(PredictionTicket {
            annotation_id: self.id.clone(),
            generation: self.generation,
            frame_index: self.initial_frame,
            points: self.points.clone(),
        })
    }

    pub fn is_current(&self, ticket: &PredictionTicket) -> bool {
        ticket.annotation_id == self.id
            && ticket.generation == self.generation
            && ticket.frame_index == self.initial_frame
    }

    /// Store a prediction result if its ticket is still current.
    /// Returns `Ok(false)` when the result was stale and dropped.
    pub fn apply_prediction(&mut self, ticket: &PredictionTicket, mask: Mask) -> Result<bool> {
        self.ensure_mutable()?;
        if !self.is_current(ticket) {
            debug!(
                "Dropping stale prediction for {} (generation {} < {})",
                self.id, ticket.generation, self.generation
            );
            return Ok(false);
        }
        self.mask = Some(mask);
        Ok(true)
    }

    /// One-way transition to confirmed.
    pub fn confirm(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.confirmed = true;
        Ok(())
    }

    pub(crate) fn push_bbox(&mut self, frame_index: FrameIndex, bbox: BBox) {
        self.bounding_boxes.push(FrameBox { frame_index, bbox });
    }

    pub(crate) fn mark_processed(&mut self, duration: Duration) {
        self.processed = true;
        self.processing_duration = duration;
    }
}
