//! Notification collaborator interface

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::CollaboratorResult;

/// Real-time status events consumed by the dashboard
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record_event(&self, campaign_id: &str, event_type: &str, payload: Value) -> CollaboratorResult<()>;
}

/// Record an event, logging and swallowing any failure
pub async fn emit_event(sink: &dyn EventSink, campaign_id: &str, event_type: &str, payload: Value) {
    debug!(%campaign_id, %event_type, "emit_event: called");
    if let Err(e) = sink.record_event(campaign_id, event_type, payload).await {
        warn!(%campaign_id, %event_type, error = %e, "Failed to record event");
    }
}
