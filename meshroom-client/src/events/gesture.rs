use crate::error::{MeshError, MeshResult};
use crate::events::SideChannelBus;
use async_trait::async_trait;
use meshroom_core::utils::GESTURE_WARMUP_LABEL;
use meshroom_core::{RoomId, TextKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// One classification result from the inference service.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureReading {
    pub label: String,
    pub confidence: f32,
}

impl GestureReading {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Stateless gesture classifier. `Ok(None)` means nothing was recognised.
#[async_trait]
pub trait GestureInference: Send + Sync {
    async fn infer(&self, frame_data: &str) -> MeshResult<Option<GestureReading>>;
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    frame_data: &'a str,
    meeting_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    success: bool,
    gesture: Option<String>,
    confidence: Option<f32>,
    error: Option<String>,
}

/// Client for the HTTP inference endpoint.
pub struct HttpGestureInference {
    client: reqwest::Client,
    endpoint: String,
    room: RoomId,
}

impl HttpGestureInference {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(endpoint: impl Into<String>, room: RoomId) -> MeshResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MeshError::Inference(format!("failed to build HTTP client: {e:#}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            room,
        })
    }
}

#[async_trait]
impl GestureInference for HttpGestureInference {
    async fn infer(&self, frame_data: &str) -> MeshResult<Option<GestureReading>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&InferenceRequest {
                frame_data,
                meeting_id: self.room.as_str(),
            })
            .send()
            .await
            .map_err(|e| MeshError::Inference(format!("request failed: {e:#}")))?;

        if !response.status().is_success() {
            return Err(MeshError::Inference(format!(
                "inference endpoint returned {}",
                response.status()
            )));
        }

        let body: InferenceResponse = response
            .json()
            .await
            .map_err(|e| MeshError::Inference(format!("invalid response: {e:#}")))?;

        if let Some(error) = body.error {
            return Err(MeshError::Inference(error));
        }
        if !body.success {
            return Ok(None);
        }

        Ok(body
            .gesture
            .map(|label| GestureReading::new(label, body.confidence.unwrap_or(0.0))))
    }
}

#[derive(Debug, Clone)]
pub struct GestureConfig {
    /// Readings must be strictly above this to be forwarded.
    pub confidence_threshold: f32,
    /// The same label is not forwarded again within this window.
    pub repeat_cooldown: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            repeat_cooldown: Duration::from_secs(2),
        }
    }
}

/// Turns inference readings into `gesture-derived` text on the side channel.
pub struct GestureForwarder {
    bus: SideChannelBus,
    config: GestureConfig,
    last_forwarded: Option<(String, Instant)>,
}

impl GestureForwarder {
    pub fn new(bus: SideChannelBus, config: GestureConfig) -> Self {
        Self {
            bus,
            config,
            last_forwarded: None,
        }
    }

    /// Whether `reading` would be forwarded at `now`.
    pub fn accept(&self, reading: &GestureReading, now: Instant) -> bool {
        if reading.label.is_empty() || reading.label == GESTURE_WARMUP_LABEL {
            return false;
        }
        if reading.confidence <= self.config.confidence_threshold {
            return false;
        }
        match &self.last_forwarded {
            Some((label, at)) if *label == reading.label => {
                now.saturating_duration_since(*at) >= self.config.repeat_cooldown
            }
            _ => true,
        }
    }

    /// Publishes `reading` if it passes the filters. Returns whether it was sent.
    pub async fn forward(&mut self, reading: &GestureReading) -> MeshResult<bool> {
        let now = Instant::now();
        if !self.accept(reading, now) {
            debug!(
                "Dropping gesture '{}' ({:.2})",
                reading.label, reading.confidence
            );
            return Ok(false);
        }

        self.bus
            .broadcast_text(TextKind::GestureDerived, reading.label.clone())
            .await?;
        info!("Forwarded gesture '{}'", reading.label);
        self.last_forwarded = Some((reading.label.clone(), now));
        Ok(true)
    }

    /// Classifies one frame and forwards the result. Returns the label sent, if any.
    pub async fn process_frame(
        &mut self,
        inference: &dyn GestureInference,
        frame_data: &str,
    ) -> MeshResult<Option<String>> {
        let Some(reading) = inference.infer(frame_data).await? else {
            return Ok(None);
        };
        if self.forward(&reading).await? {
            return Ok(Some(reading.label));
        }
        Ok(None)
    }
}
