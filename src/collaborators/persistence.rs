//! Persistence collaborator interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::{CampaignStatus, PlacementRecord};

use super::error::CollaboratorResult;

/// Storage for placements, campaign status and metric series
///
/// Called concurrently by every in-flight operation of every campaign, so
/// implementations must be safe for concurrent use. Writes are assumed
/// at-least-once; there is no transaction spanning operations.
#[async_trait]
pub trait PlacementStore: Send + Sync {
    /// Insert a placement and return its assigned id
    async fn insert_placement(&self, record: PlacementRecord) -> CollaboratorResult<String>;

    /// Merge `fields` (a JSON object) into an existing placement
    async fn update_placement(&self, id: &str, fields: Value) -> CollaboratorResult<()>;

    /// Mark a placement removed with a reason
    async fn mark_removed(&self, id: &str, reason: &str) -> CollaboratorResult<()>;

    /// Placements of a campaign not updated since `older_than`
    async fn query_stale_placements(
        &self,
        campaign_id: &str,
        older_than: DateTime<Utc>,
    ) -> CollaboratorResult<Vec<PlacementRecord>>;

    /// Append one point to a named metric series
    async fn append_metric(
        &self,
        campaign_id: &str,
        metric_name: &str,
        value: f64,
        metadata: Value,
    ) -> CollaboratorResult<()>;

    /// Record the campaign's runtime status
    async fn set_campaign_status(&self, campaign_id: &str, status: CampaignStatus) -> CollaboratorResult<()>;
}
