//! Video: frame sequence, embedding cache and annotation indexes

use crate::annotation::Annotation;
use crate::cache::EncodingCache;
use crate::error::{AnnotateError, Result};
use crate::frames::FrameUrls;
use crate::processing::ingestion::TrackingResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};
use vidmark_core::{BBox, FrameIndex, FramesConfig};

/// Video listing as served by the frame backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub name: String,
    #[serde(default)]
    pub image_count: Option<usize>,
    /// Thumbnail frame label
    #[serde(default)]
    pub image: Option<String>,
    pub frames: Vec<String>,
}

/// Box reported for a frame, with its owning annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxEntry {
    pub frame_index: FrameIndex,
    pub annotation_id: String,
    pub bbox: BBox,
}

/// Outcome of applying one tracking result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IngestReport {
    pub object_id: String,
    pub applied: usize,
    pub skipped_labels: Vec<String>,
    pub malformed: usize,
}

/// Single owner of confirmed annotations, indexed by id and by frame.
#[derive(Default)]
struct AnnotationIndex {
    annotations: Vec<Annotation>,
    by_id: HashMap<String, usize>,
    boxes_by_frame: BTreeMap<FrameIndex, Vec<BoxEntry>>,
}

pub struct Video {
    name: String,
    frames: Vec<String>,
    labels: HashMap<String, FrameIndex>,
    thumbnail: Option<String>,
    cache: EncodingCache,
    index: RwLock<AnnotationIndex>,
}

impl Video {
    pub fn new(name: impl Into<String>, frames: Vec<String>) -> Result<Self> {
        let name = name.into();
        let mut labels = HashMap::with_capacity(frames.len());
        for (index, label) in frames.iter().enumerate() {
            if labels.insert(label.clone(), index).is_some() {
                return Err(AnnotateError::InvalidAnnotation(format!(
                    "Duplicate frame label '{}' in video '{}'",
                    label, name
                )));
            }
        }

        debug!("Video '{}' with {} frames", name, frames.len());
        Ok(Self {
            name,
            frames,
            labels,
            thumbnail: None,
            cache: EncodingCache::new(),
            index: RwLock::new(AnnotationIndex::default()),
        })
    }

    pub fn from_info(info: VideoInfo) -> Result<Self> {
        if let Some(count) = info.image_count {
            if count != info.frames.len() {
                warn!(
                    "Video '{}' reports {} images but lists {} frames",
                    info.name,
                    count,
                    info.frames.len()
                );
            }
        }
        let mut video = Self::new(info.name, info.frames)?;
        video.thumbnail = info.image;
        Ok(video)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn cache(&self) -> &EncodingCache {
        &self.cache
    }

    pub fn check_frame(&self, index: FrameIndex) -> Result<()> {
        if index >= self.frames.len() {
            return Err(AnnotateError::OutOfRangeFrame {
                index,
                frame_count: self.frames.len(),
            });
        }
        Ok(())
    }

    pub fn frame_label(&self, index: FrameIndex) -> Result<&str> {
        self.check_frame(index)?;
        Ok(&self.frames[index])
    }

    pub fn frame_index(&self, label: &str) -> Option<FrameIndex> {
        self.labels.get(label).copied()
    }

    pub fn raw_frame_url(&self, index: FrameIndex, config: &FramesConfig) -> Result<String> {
        Ok(FrameUrls::new(config, &self.name).raw(self.frame_label(index)?))
    }

    pub fn compressed_frame_url(&self, index: FrameIndex, config: &FramesConfig) -> Result<String> {
        Ok(FrameUrls::new(config, &self.name).compressed(self.frame_label(index)?))
    }

    /// Falls back to the first frame when no thumbnail was listed.
    pub fn thumbnail_url(&self, config: &FramesConfig) -> Option<String> {
        let label = self.thumbnail.as_deref().or(self.frames.first().map(String::as_str))?;
        Some(FrameUrls::new(config, &self.name).thumbnail(label))
    }

    /// Take ownership of a confirmed annotation.
    pub fn add_annotation(&self, annotation: Annotation) -> Result<()> {
        if !annotation.is_confirmed() {
            return Err(AnnotateError::InvalidAnnotation(format!(
                "Annotation {} is not confirmed",
                annotation.id()
            )));
        }
        self.check_frame(annotation.initial_frame())?;

        let mut index = self.index.write();
        if index.by_id.contains_key(annotation.id()) {
            return Err(AnnotateError::InvalidAnnotation(format!(
                "Annotation {} already exists",
                annotation.id()
            )));
        }
        let position = index.annotations.len();
        index.by_id.insert(annotation.id().to_string(), position);
        info!(
            "Added annotation {} on frame {} to '{}'",
            annotation.id(),
            annotation.initial_frame(),
            self.name
        );
        index.annotations.push(annotation);
        Ok(())
    }

    pub fn annotation_count(&self) -> usize {
        self.index.read().annotations.len()
    }

    /// Snapshot of all annotations in insertion order.
    pub fn annotations(&self) -> Vec<Annotation> {
        self.index.read().annotations.clone()
    }

    pub fn annotation(&self, id: &str) -> Option<Annotation> {
        let index = self.index.read();
        index.by_id.get(id).map(|&pos| index.annotations[pos].clone())
    }

    /// Annotations first prompted on `frame`.
    pub fn annotations_for_frame(&self, frame: FrameIndex) -> Vec<Annotation> {
        self.index
            .read()
            .annotations
            .iter()
            .filter(|a| a.initial_frame() == frame)
            .cloned()
            .collect()
    }

    pub fn boxes_for_frame(&self, frame: FrameIndex) -> Vec<BoxEntry> {
        self.index
            .read()
            .boxes_by_frame
            .get(&frame)
            .cloned()
            .unwrap_or_default()
    }

    /// Apply a parsed tracking result. Both indexes are updated under one
    /// write lock. Unknown frame labels are skipped; an unknown object id or a
    /// response for another video rejects the whole batch.
    pub fn apply_tracking(&self, result: &TrackingResult, duration: Duration) -> Result<IngestReport> {
        if let Some(space) = result.space_name.as_deref() {
            if space != self.name {
                return Err(AnnotateError::VideoMismatch {
                    expected: self.name.clone(),
                    actual: space.to_string(),
                });
            }
        }

        let mut guard = self.index.write();
        let index = &mut *guard;
        let position = *index
            .by_id
            .get(&result.object_id)
            .ok_or_else(|| AnnotateError::UnknownObjectId(result.object_id.clone()))?;

        let mut report = IngestReport {
            object_id: result.object_id.clone(),
            malformed: result.malformed,
            ..IngestReport::default()
        };

        let annotation = &mut index.annotations[position];
        for entry in &result.entries {
            let Some(frame_index) = self.frame_index(&entry.frame_label) else {
                warn!(
                    "{}",
                    AnnotateError::UnresolvedFrameLabel(entry.frame_label.clone())
                );
                report.skipped_labels.push(entry.frame_label.clone());
                continue;
            };

            annotation.push_bbox(frame_index, entry.bbox);
            index
                .boxes_by_frame
                .entry(frame_index)
                .or_default()
                .push(BoxEntry {
                    frame_index,
                    annotation_id: result.object_id.clone(),
                    bbox: entry.bbox,
                });
            report.applied += 1;
        }

        annotation.mark_processed(duration);
        Ok(report)
    }
}

impl std::fmt::Debug for Video {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Video")
            .field("name", &self.name)
            .field("frames", &self.frames.len())
            .field("annotations", &self.annotation_count())
            .field("encoded", &self.cache.len())
            .finish()
    }
}
