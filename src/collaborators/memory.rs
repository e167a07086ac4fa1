//! In-memory collaborators
//!
//! Used by the `crt` simulator and by tests. They keep everything in process
//! memory and can be told to fail so error paths can be exercised.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{CampaignStatus, PlacementRecord, PlacementStatus};

use super::error::{CollaboratorError, CollaboratorResult};
use super::notification::EventSink;
use super::persistence::PlacementStore;

/// One appended metric point
#[derive(Debug, Clone, Serialize)]
pub struct MetricPoint {
    pub campaign_id: String,
    pub metric_name: String,
    pub value: f64,
    pub metadata: Value,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct StoreInner {
    placements: HashMap<String, PlacementRecord>,
    metrics: Vec<MetricPoint>,
    campaign_status: HashMap<String, CampaignStatus>,
}

/// Process-local placement store
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
    fail_writes: AtomicBool,
    fail_metrics: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        debug!("MemoryStore::new: called");
        Self::default()
    }

    /// Make placement writes fail until reset
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `append_metric` fail until reset
    pub fn set_fail_metrics(&self, fail: bool) {
        self.fail_metrics.store(fail, Ordering::SeqCst);
    }

    pub fn placement(&self, id: &str) -> Option<PlacementRecord> {
        self.lock().ok().and_then(|inner| inner.placements.get(id).cloned())
    }

    pub fn placements(&self, campaign_id: &str) -> Vec<PlacementRecord> {
        self.lock()
            .map(|inner| {
                inner
                    .placements
                    .values()
                    .filter(|p| p.campaign_id == campaign_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Store a record as-is, keeping its id and timestamps
    pub fn seed_placement(&self, record: PlacementRecord) -> CollaboratorResult<()> {
        let mut inner = self.lock()?;
        inner.placements.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn metric_points(&self, campaign_id: &str, metric_name: &str) -> Vec<MetricPoint> {
        self.lock()
            .map(|inner| {
                inner
                    .metrics
                    .iter()
                    .filter(|m| m.campaign_id == campaign_id && m.metric_name == metric_name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn campaign_status(&self, campaign_id: &str) -> Option<CampaignStatus> {
        self.lock()
            .ok()
            .and_then(|inner| inner.campaign_status.get(campaign_id).copied())
    }

    fn lock(&self) -> CollaboratorResult<std::sync::MutexGuard<'_, StoreInner>> {
        self.inner
            .lock()
            .map_err(|_| CollaboratorError::Store("store lock poisoned".to_string()))
    }

    fn check_writes(&self) -> CollaboratorResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("placement writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PlacementStore for MemoryStore {
    async fn insert_placement(&self, mut record: PlacementRecord) -> CollaboratorResult<String> {
        debug!(campaign_id = %record.campaign_id, "MemoryStore::insert_placement: called");
        self.check_writes()?;
        let id = Uuid::now_v7().to_string();
        record.id = id.clone();
        self.lock()?.placements.insert(id.clone(), record);
        Ok(id)
    }

    async fn update_placement(&self, id: &str, fields: Value) -> CollaboratorResult<()> {
        debug!(%id, "MemoryStore::update_placement: called");
        self.check_writes()?;
        let mut inner = self.lock()?;
        let record = inner
            .placements
            .get_mut(id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("placement {}", id)))?;

        let mut current = serde_json::to_value(&*record).map_err(|e| CollaboratorError::Store(e.to_string()))?;
        if let (Some(target), Some(patch)) = (current.as_object_mut(), fields.as_object()) {
            for (key, value) in patch {
                if key != "id" && key != "campaign_id" {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        let mut updated: PlacementRecord =
            serde_json::from_value(current).map_err(|e| CollaboratorError::Store(e.to_string()))?;
        updated.updated_at = Utc::now();
        *record = updated;
        Ok(())
    }

    async fn mark_removed(&self, id: &str, reason: &str) -> CollaboratorResult<()> {
        debug!(%id, %reason, "MemoryStore::mark_removed: called");
        self.check_writes()?;
        let mut inner = self.lock()?;
        let record = inner
            .placements
            .get_mut(id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("placement {}", id)))?;
        record.status = PlacementStatus::Removed;
        record.removal_reason = Some(reason.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn query_stale_placements(
        &self,
        campaign_id: &str,
        older_than: DateTime<Utc>,
    ) -> CollaboratorResult<Vec<PlacementRecord>> {
        debug!(%campaign_id, %older_than, "MemoryStore::query_stale_placements: called");
        let inner = self.lock()?;
        Ok(inner
            .placements
            .values()
            .filter(|p| p.campaign_id == campaign_id)
            .filter(|p| p.status != PlacementStatus::Removed)
            .filter(|p| p.updated_at < older_than)
            .cloned()
            .collect())
    }

    async fn append_metric(
        &self,
        campaign_id: &str,
        metric_name: &str,
        value: f64,
        metadata: Value,
    ) -> CollaboratorResult<()> {
        debug!(%campaign_id, %metric_name, value, "MemoryStore::append_metric: called");
        if self.fail_metrics.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("metric writes disabled".to_string()));
        }
        self.lock()?.metrics.push(MetricPoint {
            campaign_id: campaign_id.to_string(),
            metric_name: metric_name.to_string(),
            value,
            metadata,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn set_campaign_status(&self, campaign_id: &str, status: CampaignStatus) -> CollaboratorResult<()> {
        debug!(%campaign_id, %status, "MemoryStore::set_campaign_status: called");
        self.lock()?.campaign_status.insert(campaign_id.to_string(), status);
        Ok(())
    }
}

/// One recorded notification
#[derive(Debug, Clone, Serialize)]
pub struct RecordedEvent {
    pub campaign_id: String,
    pub event_type: String,
    pub payload: Value,
}

/// Process-local event sink that keeps every event it receives
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<RecordedEvent>>,
    fail: AtomicBool,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        debug!("MemoryEventSink::new: called");
        Self::default()
    }

    /// Make `record_event` fail until reset
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn record_event(&self, campaign_id: &str, event_type: &str, payload: Value) -> CollaboratorResult<()> {
        debug!(%campaign_id, %event_type, "MemoryEventSink::record_event: called");
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Notification("event sink disabled".to_string()));
        }
        self.events
            .lock()
            .map_err(|_| CollaboratorError::Notification("event sink lock poisoned".to_string()))?
            .push(RecordedEvent {
                campaign_id: campaign_id.to_string(),
                event_type: event_type.to_string(),
                payload,
            });
        Ok(())
    }
}
