use std::sync::Arc;

use crate::bridge::{EventBridge, EventListener, StartAck};
use crate::error::PipelineError;

pub const LISTENING_STARTED: &str = "Listening started";
pub const ALREADY_LISTENING: &str = "Already listening";
pub const LISTENING_STOPPED: &str = "Listening stopped";

/// Start/stop and permission operations exposed to whatever drives the daemon.
///
/// Failures carry a [`PipelineError`]; its [`code`](PipelineError::code) is
/// the string reported to callers (`PERMISSION_DENIED` or `ERROR`).
pub struct ControlSurface {
    bridge: Arc<EventBridge>,
    listener: Arc<dyn EventListener>,
}

impl ControlSurface {
    /// `listener` is the sink registered on every successful start.
    pub fn new(bridge: Arc<EventBridge>, listener: Arc<dyn EventListener>) -> Self {
        Self { bridge, listener }
    }

    pub fn bridge(&self) -> &Arc<EventBridge> {
        &self.bridge
    }

    pub fn is_notification_access_granted(&self) -> Result<bool, PipelineError> {
        self.bridge.gate().check().map_err(|e| {
            PipelineError::Generic(format!("Failed to check notification access: {e:#}"))
        })
    }

    pub fn open_notification_settings(&self) -> Result<bool, PipelineError> {
        self.bridge
            .gate()
            .request_access()
            .map_err(|e| PipelineError::Generic(format!("Failed to open settings: {e:#}")))?;
        Ok(true)
    }

    pub fn start_listening(&self) -> Result<&'static str, PipelineError> {
        match self.bridge.start(Arc::clone(&self.listener))? {
            StartAck::Started => Ok(LISTENING_STARTED),
            StartAck::AlreadyListening => Ok(ALREADY_LISTENING),
        }
    }

    pub async fn stop_listening(&self) -> &'static str {
        self.bridge.stop().await;
        LISTENING_STOPPED
    }
}
