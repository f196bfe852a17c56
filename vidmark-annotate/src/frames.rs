//! Frame addressing and image loading

use crate::error::{AnnotateError, Result};
use async_trait::async_trait;
use image::DynamicImage;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::debug;
use vidmark_core::FramesConfig;

/// Builds frame image URLs for one video.
#[derive(Debug, Clone)]
pub struct FrameUrls {
    base_url: String,
    raw_prefix: String,
    compressed_prefix: String,
    video: String,
}

impl FrameUrls {
    pub fn new(config: &FramesConfig, video: impl Into<String>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            raw_prefix: config.raw_prefix.trim_matches('/').to_string(),
            compressed_prefix: config.compressed_prefix.trim_matches('/').to_string(),
            video: video.into(),
        }
    }

    pub fn raw(&self, label: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, self.raw_prefix, self.video, label)
    }

    pub fn compressed(&self, label: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url, self.compressed_prefix, self.video, label
        )
    }

    /// Thumbnails are served from the compressed set.
    pub fn thumbnail(&self, label: &str) -> String {
        self.compressed(label)
    }
}

/// Loads a frame image by its label.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn fetch(&self, label: &str) -> Result<DynamicImage>;
}

fn validate_label(label: &str) -> Result<()> {
    let path = Path::new(label);
    let single_component = path.components().count() == 1
        && matches!(
            path.components().next(),
            Some(std::path::Component::Normal(_))
        );
    if label.is_empty() || !single_component {
        return Err(AnnotateError::FrameSource(format!(
            "Invalid frame label '{}'",
            label
        )));
    }
    Ok(())
}

/// Reads frames from `<root>/<label>`.
#[derive(Debug, Clone)]
pub struct DirectoryFrameSource {
    root: PathBuf,
}

impl DirectoryFrameSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    async fn fetch(&self, label: &str) -> Result<DynamicImage> {
        validate_label(label)?;
        let path = self.root.join(label);
        debug!("Loading frame {}", path.display());
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            AnnotateError::FrameSource(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(image::load_from_memory(&bytes)?)
    }
}

/// Fetches raw frames over HTTP.
pub struct HttpFrameSource {
    client: Client,
    urls: FrameUrls,
}

impl HttpFrameSource {
    pub fn new(config: &FramesConfig, video: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            urls: FrameUrls::new(config, video),
        }
    }

    pub fn urls(&self) -> &FrameUrls {
        &self.urls
    }
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn fetch(&self, label: &str) -> Result<DynamicImage> {
        validate_label(label)?;
        let url = self.urls.raw(label);
        debug!("Fetching frame {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AnnotateError::FrameSource(format!(
                "GET {} returned {}",
                url, status
            )));
        }

        let bytes = response.bytes().await?;
        Ok(image::load_from_memory(&bytes)?)
    }
}
