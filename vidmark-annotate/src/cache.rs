//! Per-frame embedding cache with single-flight encoding

use crate::error::{AnnotateError, Result};
use crate::models::{Embedding, ImageEncoder};
use image::DynamicImage;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, warn};
use vidmark_core::FrameIndex;

type Outcome = Option<std::result::Result<Arc<Embedding>, String>>;

enum Slot {
    Ready(Arc<Embedding>),
    /// An encode is running; subscribers see its outcome.
    Pending(watch::Receiver<Outcome>),
}

enum Claim {
    Ready(Arc<Embedding>),
    Wait(watch::Receiver<Outcome>),
    Lead(watch::Sender<Outcome>),
}

/// Frame index → embedding. Entries never expire; at most one encode per
/// frame is in flight and concurrent callers share its result.
#[derive(Default)]
pub struct EncodingCache {
    slots: Mutex<HashMap<FrameIndex, Slot>>,
}

/// Removes the pending marker if the leading encode fails or is dropped.
struct PendingGuard<'a> {
    cache: &'a EncodingCache,
    frame: FrameIndex,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut slots = self.cache.slots.lock();
            if matches!(slots.get(&self.frame), Some(Slot::Pending(_))) {
                slots.remove(&self.frame);
            }
        }
    }
}

impl EncodingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, frame: FrameIndex) -> Option<Arc<Embedding>> {
        match self.slots.lock().get(&frame) {
            Some(Slot::Ready(embedding)) => Some(Arc::clone(embedding)),
            _ => None,
        }
    }

    pub fn contains(&self, frame: FrameIndex) -> bool {
        self.get(frame).is_some()
    }

    pub fn is_pending(&self, frame: FrameIndex) -> bool {
        matches!(self.slots.lock().get(&frame), Some(Slot::Pending(_)))
    }

    /// Number of completed entries.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|s| matches!(s, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn claim(&self, frame: FrameIndex) -> Claim {
        let mut slots = self.slots.lock();
        match slots.get(&frame) {
            Some(Slot::Ready(embedding)) => Claim::Ready(Arc::clone(embedding)),
            Some(Slot::Pending(rx)) => Claim::Wait(rx.clone()),
            None => {
                let (tx, rx) = watch::channel(None);
                slots.insert(frame, Slot::Pending(rx));
                Claim::Lead(tx)
            }
        }
    }

    /// Return the cached embedding for `frame`, encoding `image` if absent.
    pub async fn ensure(
        &self,
        frame: FrameIndex,
        image: &DynamicImage,
        encoder: &dyn ImageEncoder,
    ) -> Result<Arc<Embedding>> {
        loop {
            match self.claim(frame) {
                Claim::Ready(embedding) => return Ok(embedding),
                Claim::Wait(rx) => {
                    if let Some(outcome) = Self::wait(rx).await {
                        return outcome;
                    }
                    // Leader went away without an outcome; try to take over.
                    debug!("Encode for frame {} was abandoned, retrying", frame);
                }
                Claim::Lead(tx) => return self.lead(frame, image, encoder, tx).await,
            }
        }
    }

    async fn lead(
        &self,
        frame: FrameIndex,
        image: &DynamicImage,
        encoder: &dyn ImageEncoder,
        tx: watch::Sender<Outcome>,
    ) -> Result<Arc<Embedding>> {
        let mut guard = PendingGuard {
            cache: self,
            frame,
            armed: true,
        };

        debug!("Encoding frame {} with {}", frame, encoder.name());
        let started = Instant::now();
        let result = encoder.encode(image).await;
        guard.armed = false;

        match result {
            Ok(embedding) => {
                let embedding = Arc::new(embedding);
                self.slots
                    .lock()
                    .insert(frame, Slot::Ready(Arc::clone(&embedding)));
                tx.send_replace(Some(Ok(Arc::clone(&embedding))));
                debug!("Encoded frame {} in {:?}", frame, started.elapsed());
                Ok(embedding)
            }
            Err(err) => {
                self.slots.lock().remove(&frame);
                let message = err.to_string();
                tx.send_replace(Some(Err(message.clone())));
                warn!("Encoding frame {} failed: {}", frame, message);
                Err(match err {
                    AnnotateError::EncodingFailure(_) => err,
                    other => AnnotateError::EncodingFailure(other.to_string()),
                })
            }
        }
    }

    /// `None` when the leader was dropped before publishing an outcome.
    async fn wait(mut rx: watch::Receiver<Outcome>) -> Option<Result<Arc<Embedding>>> {
        loop {
            let current = rx.borrow().clone();
            if let Some(outcome) = current {
                return Some(outcome.map_err(AnnotateError::EncodingFailure));
            }
            if rx.changed().await.is_err() {
                let last = rx.borrow().clone();
                return last.map(|o| o.map_err(AnnotateError::EncodingFailure));
            }
        }
    }
}
