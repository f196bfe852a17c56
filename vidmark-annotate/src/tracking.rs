//! Tracking backend submission

use crate::error::{AnnotateError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use vidmark_core::TrackingConfig;

/// Body of a tracking submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRequest {
    /// Video name
    pub space_name: String,
    /// Label of the frame the mask was drawn on
    pub frame_name: String,
    pub object_id: String,
    /// Transport-encoded mask
    pub mask: String,
    pub description: String,
}

/// Propagates a confirmed mask through the video and returns the raw response.
#[async_trait]
pub trait TrackingBackend: Send + Sync {
    async fn submit(&self, request: &TrackingRequest) -> Result<Value>;
}

/// POSTs submissions as JSON.
pub struct HttpTrackingBackend {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTrackingBackend {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TrackingBackend for HttpTrackingBackend {
    async fn submit(&self, request: &TrackingRequest) -> Result<Value> {
        info!(
            "Submitting {} on {}/{} to {}",
            request.object_id, request.space_name, request.frame_name, self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnnotateError::Tracking(format!(
                "Tracking backend returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let value: Value = response.json().await?;
        debug!("Tracking response received for {}", request.object_id);
        Ok(value)
    }
}
