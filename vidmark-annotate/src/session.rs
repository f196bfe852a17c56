//! Interactive annotation session over one video

use crate::annotation::Annotation;
use crate::catalog::{ObjectType, TypeCatalog};
use crate::codec::compress_mask_with;
use crate::error::{AnnotateError, Result};
use crate::frames::FrameSource;
use crate::models::{ImageEncoder, MaskPredictor};
use crate::navigation::{FrameCursor, FrameNavigator, ReviewPlayer};
use crate::processing::ingestion::ingest_response;
use crate::processing::PredictionOrchestrator;
use crate::tracking::{TrackingBackend, TrackingRequest};
use crate::transform::display_to_image;
use crate::video::{IngestReport, Video};
use image::DynamicImage;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vidmark_core::{AnnotatorConfig, Dimensions, FrameIndex, Point};

/// External collaborators of a session.
#[derive(Clone)]
pub struct SessionServices {
    pub encoder: Arc<dyn ImageEncoder>,
    pub predictor: Arc<dyn MaskPredictor>,
    pub tracking: Arc<dyn TrackingBackend>,
    pub frames: Arc<dyn FrameSource>,
}

/// Totals shown when annotation of a video is finished.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub total_annotations: usize,
    pub processed_annotations: usize,
    pub average_processing_secs: f64,
}

struct SessionState {
    navigator: FrameNavigator,
    draft: Option<Annotation>,
    catalog: TypeCatalog,
}

impl SessionState {
    /// Frame changes keep the draft but drop its points and mask.
    fn on_frame_changed(&mut self) {
        if let Some(draft) = self.draft.as_mut() {
            if let Err(e) = draft.clear_points() {
                warn!("Could not reset draft {}: {}", draft.id(), e);
            }
        }
    }

    fn select(&mut self, index: FrameIndex) -> Result<()> {
        if self.navigator.set(index)? {
            self.on_frame_changed();
        }
        Ok(())
    }

    fn step(&mut self, forward: bool) -> Option<FrameIndex> {
        let before = self.navigator.current();
        let after = if forward {
            self.navigator.next()
        } else {
            self.navigator.prev()
        };
        if after != before {
            self.on_frame_changed();
        }
        after
    }
}

struct Shared {
    state: Mutex<SessionState>,
}

impl FrameCursor for Shared {
    fn advance(&self) -> bool {
        let mut state = self.state.lock();
        if state.navigator.is_at_end() {
            return false;
        }
        state.step(true).is_some()
    }
}

/// Drives one user's annotation of a video: frame selection, point prompts,
/// mask prediction, confirmation and tracking submission.
pub struct AnnotationSession {
    config: AnnotatorConfig,
    video: Arc<Video>,
    shared: Arc<Shared>,
    orchestrator: PredictionOrchestrator,
    tracking: Arc<dyn TrackingBackend>,
    frames: Arc<dyn FrameSource>,
    review: ReviewPlayer,
    loaded: Mutex<Option<(FrameIndex, Arc<DynamicImage>)>>,
}

impl AnnotationSession {
    pub fn new(video: Video, config: AnnotatorConfig, services: SessionServices) -> Self {
        let navigator = FrameNavigator::new(video.frame_count());
        let catalog = TypeCatalog::new(&config.catalog);
        let orchestrator = PredictionOrchestrator::new(
            services.encoder,
            services.predictor,
            config.models.model_edge,
        );
        info!(
            "Session opened for '{}' ({} frames)",
            video.name(),
            video.frame_count()
        );

        Self {
            review: ReviewPlayer::new(config.review.interval()),
            video: Arc::new(video),
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState {
                    navigator,
                    draft: None,
                    catalog,
                }),
            }),
            orchestrator,
            tracking: services.tracking,
            frames: services.frames,
            loaded: Mutex::new(None),
            config,
        }
    }

    pub fn video(&self) -> &Arc<Video> {
        &self.video
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn current_frame(&self) -> Option<FrameIndex> {
        self.shared.state.lock().navigator.current()
    }

    /// Snapshot of the draft in progress.
    pub fn draft(&self) -> Option<Annotation> {
        self.shared.state.lock().draft.clone()
    }

    pub fn object_types(&self) -> Vec<ObjectType> {
        self.shared.state.lock().catalog.types().to_vec()
    }

    pub fn add_object_type(&self, name: &str) -> Result<ObjectType> {
        self.shared.state.lock().catalog.add_type(name).cloned()
    }

    // Navigation

    pub fn set_frame(&self, index: FrameIndex) -> Result<()> {
        self.shared.state.lock().select(index)
    }

    pub fn next_frame(&self) -> Option<FrameIndex> {
        self.shared.state.lock().step(true)
    }

    pub fn prev_frame(&self) -> Option<FrameIndex> {
        self.shared.state.lock().step(false)
    }

    /// Fetch a frame image, reusing the last one loaded.
    pub async fn load_frame(&self, index: FrameIndex) -> Result<Arc<DynamicImage>> {
        let cached = self
            .loaded
            .lock()
            .as_ref()
            .filter(|(frame, _)| *frame == index)
            .map(|(_, image)| Arc::clone(image));
        if let Some(image) = cached {
            return Ok(image);
        }

        let label = self.video.frame_label(index)?.to_string();
        let image = Arc::new(self.frames.fetch(&label).await?);
        *self.loaded.lock() = Some((index, Arc::clone(&image)));
        Ok(image)
    }

    /// Load the current frame and make sure its embedding is cached.
    pub async fn prepare_current_frame(&self) -> Result<()> {
        let frame = self.current_frame().ok_or(AnnotateError::NoCurrentFrame)?;
        let image = self.load_frame(frame).await?;
        self.orchestrator.prepare(&self.video, frame, &image).await
    }

    // Drafting

    /// Begin a new annotation of `object_type` on the current frame. Any
    /// unconfirmed draft is discarded.
    pub fn start_annotation(&self, object_type: &str) -> Result<String> {
        let mut state = self.shared.state.lock();
        let frame = state.navigator.current().ok_or(AnnotateError::NoCurrentFrame)?;
        let allocation = state.catalog.allocate(object_type)?;

        let draft = Annotation::new(
            frame,
            allocation.object_type,
            allocation.overall_index,
            allocation.type_index,
            allocation.color,
        );
        let id = draft.id().to_string();
        if let Some(previous) = state.draft.replace(draft) {
            info!("Discarded unconfirmed draft {}", previous.id());
        }
        info!("Started annotation {} on frame {}", id, frame);
        Ok(id)
    }

    /// Drop the draft in progress. Returns whether there was one.
    pub fn discard_draft(&self) -> bool {
        match self.shared.state.lock().draft.take() {
            Some(previous) => {
                info!("Discarded draft {}", previous.id());
                true
            }
            None => false,
        }
    }

    /// Add a point at normalized image coordinates and refresh the mask.
    ///
    /// The point's label comes from the current mask. A prediction failure is
    /// returned as an error but the point stays on the draft.
    pub async fn add_point(&self, x: f64, y: f64) -> Result<Point> {
        let point = {
            let mut state = self.shared.state.lock();
            let current = state.navigator.current().ok_or(AnnotateError::NoCurrentFrame)?;
            let draft = state.draft.as_mut().ok_or(AnnotateError::NoActiveDraft)?;
            if draft.initial_frame() != current {
                return Err(AnnotateError::DraftOnOtherFrame {
                    draft_frame: draft.initial_frame(),
                    current,
                });
            }
            if !Point::positive(x, y).is_inside_image() {
                return Err(AnnotateError::PointOutsideImage { x, y });
            }
            draft.add_classified_point(x, y, self.config.models.foreground_threshold)?
        };

        debug!("Added {} point at ({:.3}, {:.3})", point.label, x, y);
        self.refresh_mask().await?;
        Ok(point)
    }

    /// Add a point from display-surface pixel coordinates.
    pub async fn click(&self, surface: Dimensions, px: f64, py: f64) -> Result<Point> {
        let frame = {
            let state = self.shared.state.lock();
            let draft = state.draft.as_ref().ok_or(AnnotateError::NoActiveDraft)?;
            draft.initial_frame()
        };
        let image = self.load_frame(frame).await?;
        let dims = Dimensions::new(image.width() as f64, image.height() as f64);
        let (x, y) = display_to_image(surface, dims, px, py).ok_or_else(|| {
            AnnotateError::InvalidAnnotation("Display surface or image has no area".to_string())
        })?;
        self.add_point(x, y).await
    }

    pub fn clear_points(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        let draft = state.draft.as_mut().ok_or(AnnotateError::NoActiveDraft)?;
        draft.clear_points()
    }

    /// Predict a mask for the draft's current points. Returns `Ok(false)`
    /// when the result was superseded before it arrived.
    pub async fn refresh_mask(&self) -> Result<bool> {
        let ticket = {
            let mut state = self.shared.state.lock();
            let draft = state.draft.as_mut().ok_or(AnnotateError::NoActiveDraft)?;
            if draft.points().is_empty() {
                return Ok(false);
            }
            draft.issue_ticket()?
        };

        let image = self.load_frame(ticket.frame_index).await?;
        let mask = self
            .orchestrator
            .predict(&self.video, ticket.frame_index, &image, &ticket.points)
            .await?;

        let mut state = self.shared.state.lock();
        match state.draft.as_mut() {
            Some(draft) if draft.id() == ticket.annotation_id => draft.apply_prediction(&ticket, mask),
            _ => {
                debug!("Draft {} is gone, dropping its mask", ticket.annotation_id);
                Ok(false)
            }
        }
    }

    /// Confirm the draft, hand it to the video and submit it for tracking.
    ///
    /// Submission runs in the background on the current Tokio runtime; the
    /// returned handle resolves to the ingestion report once the backend
    /// answers. Outside a runtime this fails with
    /// [`AnnotateError::NoRuntime`] and the draft is left untouched.
    pub fn confirm(&self) -> Result<JoinHandle<Result<IngestReport>>> {
        let runtime = Handle::try_current().map_err(|_| AnnotateError::NoRuntime("confirm"))?;
        let (annotation, request) = {
            let mut state = self.shared.state.lock();
            let draft = state.draft.as_ref().ok_or(AnnotateError::NoActiveDraft)?;
            if !draft.is_valid() {
                return Err(AnnotateError::InvalidAnnotation(format!(
                    "{} needs at least one positive point",
                    draft.id()
                )));
            }
            let mask = draft
                .mask()
                .ok_or_else(|| AnnotateError::MissingMask(draft.id().to_string()))?;

            let request = TrackingRequest {
                space_name: self.video.name().to_string(),
                frame_name: self.video.frame_label(draft.initial_frame())?.to_string(),
                object_id: draft.id().to_string(),
                mask: compress_mask_with(mask, self.config.models.mask_threshold)?,
                description: draft.object_type().to_string(),
            };

            let mut annotation = state.draft.take().ok_or(AnnotateError::NoActiveDraft)?;
            annotation.confirm()?;
            (annotation, request)
        };

        info!(
            "Confirmed {} ({} positive, {} negative points)",
            annotation.id(),
            annotation.positive_points().count(),
            annotation.negative_points().count()
        );
        self.video.add_annotation(annotation)?;

        let video = Arc::clone(&self.video);
        let backend = Arc::clone(&self.tracking);
        Ok(runtime.spawn(async move {
            let started = Instant::now();
            let outcome = match backend.submit(&request).await {
                Ok(response) => ingest_response(&video, &response, started.elapsed()),
                Err(e) => Err(e),
            };
            match &outcome {
                Ok(_) => {}
                Err(e @ AnnotateError::UnknownObjectId(_))
                | Err(e @ AnnotateError::VideoMismatch { .. }) => {
                    warn!("Dropped tracking result for {}: {}", request.object_id, e)
                }
                Err(e) => error!("Tracking {} failed: {}", request.object_id, e),
            }
            outcome
        }))
    }

    // Review

    pub fn start_review(&self) -> Result<()> {
        let cursor: Arc<dyn FrameCursor> = self.shared.clone();
        self.review.start(cursor)
    }

    pub fn stop_review(&self) -> bool {
        self.review.stop()
    }

    pub fn is_reviewing(&self) -> bool {
        self.review.is_running()
    }

    // Completion

    pub fn summary(&self) -> SessionSummary {
        let annotations = self.video.annotations();
        let total = annotations.len();
        let processed = annotations.iter().filter(|a| a.is_processed()).count();
        let seconds: f64 = annotations
            .iter()
            .map(|a| a.processing_duration().as_secs_f64())
            .sum();

        SessionSummary {
            total_annotations: total,
            processed_annotations: processed,
            average_processing_secs: seconds / total.max(1) as f64,
        }
    }

    /// Stop playback, drop any draft and report totals.
    pub fn finish(&self) -> SessionSummary {
        self.stop_review();
        self.discard_draft();
        let summary = self.summary();
        info!(
            "Finished '{}': {} annotations, {:.2}s average processing",
            self.video.name(),
            summary.total_annotations,
            summary.average_processing_secs
        );
        summary
    }
}

impl Drop for AnnotationSession {
    fn drop(&mut self) {
        self.review.stop();
    }
}
