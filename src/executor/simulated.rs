//! Simulated placement handlers
//!
//! Stand-ins for real crawling and posting. Source metrics that a real
//! implementation would fetch are read from the payload when present and
//! otherwise drawn at random.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::collaborators::{EventSink, PlacementStore, emit_event};
use crate::domain::{OperationType, PlacementRecord, PlacementStatus};

use super::error::HandlerError;
use super::handler::{HandlerContext, HandlerResult, PlacementHandler, required_str};

/// Default age after which cleanup treats a placement as dead
pub const DEFAULT_STALE_AFTER_DAYS: i64 = 30;

/// Probability that a simulated liveness check finds the link
const LIVE_PROBABILITY: f64 = 0.9;

/// Source-domain scores for a candidate placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceScores {
    domain_authority: u32,
    quality_score: u32,
    spam_score: u32,
}

/// Handlers backed by the persistence and notification collaborators
pub struct SimulatedPlacements {
    store: Arc<dyn PlacementStore>,
    events: Arc<dyn EventSink>,
    rng: Mutex<StdRng>,
}

impl SimulatedPlacements {
    pub fn new(store: Arc<dyn PlacementStore>, events: Arc<dyn EventSink>) -> Self {
        debug!("SimulatedPlacements::new: called");
        Self {
            store,
            events,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic scores and liveness for reproducible runs
    pub fn with_seed(store: Arc<dyn PlacementStore>, events: Arc<dyn EventSink>, seed: u64) -> Self {
        debug!(seed, "SimulatedPlacements::with_seed: called");
        Self {
            store,
            events,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn source_scores(&self, payload: &Value) -> SourceScores {
        let given = |field: &str| payload.get(field).and_then(Value::as_u64).map(|v| v.min(100) as u32);
        let draw = |lo: u32, hi: u32| match self.rng.lock() {
            Ok(mut rng) => rng.random_range(lo..=hi),
            Err(_) => (lo + hi) / 2,
        };
        SourceScores {
            domain_authority: given("domain_authority").unwrap_or_else(|| draw(10, 90)),
            quality_score: given("quality_score").unwrap_or_else(|| draw(40, 100)),
            spam_score: given("spam_score").unwrap_or_else(|| draw(0, 40)),
        }
    }

    fn link_is_live(&self, payload: &Value) -> bool {
        if let Some(live) = payload.get("live").and_then(Value::as_bool) {
            return live;
        }
        match self.rng.lock() {
            Ok(mut rng) => rng.random_bool(LIVE_PROBABILITY),
            Err(_) => true,
        }
    }
}

/// Check a candidate source against the campaign's thresholds
fn check_thresholds(ctx: &HandlerContext, scores: &SourceScores) -> Result<(), HandlerError> {
    let t = &ctx.thresholds;
    if scores.domain_authority < t.min_domain_authority {
        return Err(HandlerError::Rejected(format!(
            "domain authority {} below minimum {}",
            scores.domain_authority, t.min_domain_authority
        )));
    }
    if scores.quality_score < t.min_quality_score {
        return Err(HandlerError::Rejected(format!(
            "quality score {} below minimum {}",
            scores.quality_score, t.min_quality_score
        )));
    }
    if scores.spam_score > t.max_spam_score {
        return Err(HandlerError::Rejected(format!(
            "spam score {} above maximum {}",
            scores.spam_score, t.max_spam_score
        )));
    }
    Ok(())
}

#[async_trait]
impl PlacementHandler for SimulatedPlacements {
    async fn create_placement(&self, ctx: &HandlerContext, payload: &Value) -> HandlerResult {
        debug!(campaign_id = %ctx.campaign_id, operation_id = %ctx.operation_id, "SimulatedPlacements::create_placement: called");
        let target_url = required_str(payload, "target_url")?;
        let source_domain = required_str(payload, "source_domain")?;
        let anchor_text = payload.get("anchor_text").and_then(Value::as_str).unwrap_or_default();

        let scores = self.source_scores(payload);
        check_thresholds(ctx, &scores)?;

        let record = PlacementRecord::new(
            &ctx.campaign_id,
            target_url,
            source_domain,
            anchor_text,
            scores.domain_authority,
            scores.quality_score,
        );
        let placement_id = self.store.insert_placement(record).await?;
        info!(campaign_id = %ctx.campaign_id, %placement_id, %source_domain, "Placement posted");

        emit_event(
            self.events.as_ref(),
            &ctx.campaign_id,
            "placement_posted",
            json!({
                "placement_id": placement_id,
                "target_url": target_url,
                "source_domain": source_domain,
            }),
        )
        .await;

        Ok(json!({
            "placement_id": placement_id,
            "domain_authority": scores.domain_authority,
            "quality_score": scores.quality_score,
            "spam_score": scores.spam_score,
        }))
    }

    async fn remove_placement(&self, ctx: &HandlerContext, payload: &Value) -> HandlerResult {
        debug!(campaign_id = %ctx.campaign_id, operation_id = %ctx.operation_id, "SimulatedPlacements::remove_placement: called");
        let placement_id = required_str(payload, "placement_id")?;
        let reason = payload
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("manual_removal");

        self.store.mark_removed(placement_id, reason).await?;
        Ok(json!({ "placement_id": placement_id, "reason": reason }))
    }

    async fn update_placement(&self, ctx: &HandlerContext, payload: &Value) -> HandlerResult {
        debug!(campaign_id = %ctx.campaign_id, operation_id = %ctx.operation_id, "SimulatedPlacements::update_placement: called");
        let placement_id = required_str(payload, "placement_id")?;
        let fields = payload
            .get("fields")
            .filter(|f| f.is_object())
            .ok_or_else(|| HandlerError::missing_field("fields"))?;

        self.store.update_placement(placement_id, fields.clone()).await?;
        Ok(json!({ "placement_id": placement_id, "updated": fields }))
    }

    async fn verify_placement(&self, ctx: &HandlerContext, payload: &Value) -> HandlerResult {
        debug!(campaign_id = %ctx.campaign_id, operation_id = %ctx.operation_id, "SimulatedPlacements::verify_placement: called");
        let placement_id = required_str(payload, "placement_id")?;
        let live = self.link_is_live(payload);
        let status = if live {
            PlacementStatus::Verified
        } else {
            PlacementStatus::Broken
        };

        self.store
            .update_placement(
                placement_id,
                json!({ "status": status, "last_verified_at": Utc::now() }),
            )
            .await?;

        emit_event(
            self.events.as_ref(),
            &ctx.campaign_id,
            "placement_verified",
            json!({ "placement_id": placement_id, "live": live }),
        )
        .await;

        Ok(json!({ "placement_id": placement_id, "live": live, "status": status }))
    }

    async fn cleanup_dead_links(&self, ctx: &HandlerContext, payload: &Value) -> HandlerResult {
        debug!(campaign_id = %ctx.campaign_id, operation_id = %ctx.operation_id, "SimulatedPlacements::cleanup_dead_links: called");
        let days = payload
            .get("older_than_days")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_STALE_AFTER_DAYS);
        let older_than = Utc::now() - Duration::days(days.max(0));

        let stale = self.store.query_stale_placements(&ctx.campaign_id, older_than).await?;
        let mut removed = Vec::with_capacity(stale.len());
        for placement in stale {
            self.store.mark_removed(&placement.id, "dead_link").await?;
            removed.push(placement.id);
        }

        info!(campaign_id = %ctx.campaign_id, removed = removed.len(), "Dead links cleaned up");
        Ok(json!({ "removed": removed.len(), "placement_ids": removed }))
    }

    fn validate(&self, op_type: OperationType, payload: &Value) -> Result<(), HandlerError> {
        debug!(%op_type, "SimulatedPlacements::validate: called");
        if !payload.is_object() {
            return Err(HandlerError::InvalidPayload("payload must be a JSON object".to_string()));
        }
        match op_type {
            OperationType::CreatePlacement => {
                required_str(payload, "target_url")?;
                required_str(payload, "source_domain")?;
            }
            OperationType::RemovePlacement | OperationType::VerifyPlacement => {
                required_str(payload, "placement_id")?;
            }
            OperationType::UpdatePlacement => {
                required_str(payload, "placement_id")?;
                if !payload.get("fields").is_some_and(Value::is_object) {
                    return Err(HandlerError::missing_field("fields"));
                }
            }
            OperationType::CleanupDeadLinks => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MemoryEventSink, MemoryStore};
    use crate::domain::Operation;
    use crate::scheduler::QualityThresholds;

    fn setup() -> (Arc<MemoryStore>, Arc<MemoryEventSink>, SimulatedPlacements) {
        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(MemoryEventSink::new());
        let handlers = SimulatedPlacements::with_seed(store.clone(), events.clone(), 7);
        (store, events, handlers)
    }

    fn ctx(op_type: OperationType) -> HandlerContext {
        let op = Operation::new("camp-1", op_type, json!({}), 0, 0, None);
        HandlerContext::for_operation(&op, &QualityThresholds::default())
    }

    fn good_source() -> Value {
        json!({
            "target_url": "https://shop.example/widgets",
            "source_domain": "blog.example",
            "anchor_text": "best widgets",
            "domain_authority": 55,
            "quality_score": 80,
            "spam_score": 2,
        })
    }

    #[tokio::test]
    async fn test_create_inserts_and_notifies() {
        let (store, events, handlers) = setup();
        let result = handlers
            .create_placement(&ctx(OperationType::CreatePlacement), &good_source())
            .await
            .unwrap();

        let placement_id = result["placement_id"].as_str().unwrap();
        let placement = store.placement(placement_id).unwrap();
        assert_eq!(placement.source_domain, "blog.example");
        assert_eq!(placement.domain_authority, 55);
        assert_eq!(events.events_of_type("placement_posted").len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_low_authority() {
        let (store, _events, handlers) = setup();
        let mut payload = good_source();
        payload["domain_authority"] = json!(5);

        let err = handlers
            .create_placement(&ctx(OperationType::CreatePlacement), &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Rejected(_)));
        assert!(store.placements("camp-1").is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_spammy_source() {
        let (_store, _events, handlers) = setup();
        let mut payload = good_source();
        payload["spam_score"] = json!(75);

        let err = handlers
            .create_placement(&ctx(OperationType::CreatePlacement), &payload)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("spam score"));
    }

    #[tokio::test]
    async fn test_verify_marks_broken_links() {
        let (store, _events, handlers) = setup();
        let created = handlers
            .create_placement(&ctx(OperationType::CreatePlacement), &good_source())
            .await
            .unwrap();
        let placement_id = created["placement_id"].as_str().unwrap().to_string();

        handlers
            .verify_placement(
                &ctx(OperationType::VerifyPlacement),
                &json!({"placement_id": placement_id, "live": false}),
            )
            .await
            .unwrap();

        let placement = store.placement(&placement_id).unwrap();
        assert_eq!(placement.status, PlacementStatus::Broken);
        assert!(placement.last_verified_at.is_some());
    }

    #[tokio::test]
    async fn test_remove_and_update_propagate_store_errors() {
        let (_store, _events, handlers) = setup();
        let err = handlers
            .remove_placement(&ctx(OperationType::RemovePlacement), &json!({"placement_id": "missing"}))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Collaborator(_)));

        let err = handlers
            .update_placement(&ctx(OperationType::UpdatePlacement), &json!({"placement_id": "p"}))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_cleanup_removes_stale_placements() {
        let (store, _events, handlers) = setup();
        let mut stale = PlacementRecord::new("camp-1", "https://t", "old.example", "", 40, 70);
        stale.id = "stale-1".to_string();
        stale.updated_at = Utc::now() - Duration::days(60);
        store.seed_placement(stale).unwrap();
        handlers
            .create_placement(&ctx(OperationType::CreatePlacement), &good_source())
            .await
            .unwrap();

        let result = handlers
            .cleanup_dead_links(&ctx(OperationType::CleanupDeadLinks), &json!({}))
            .await
            .unwrap();
        assert_eq!(result["removed"], json!(1));
        assert_eq!(store.placement("stale-1").unwrap().status, PlacementStatus::Removed);
    }

    #[test]
    fn test_validate_required_fields() {
        let (_store, _events, handlers) = setup();
        assert!(handlers.validate(OperationType::CreatePlacement, &good_source()).is_ok());
        assert!(
            handlers
                .validate(OperationType::CreatePlacement, &json!({"target_url": "https://t"}))
                .is_err()
        );
        assert!(handlers.validate(OperationType::VerifyPlacement, &json!({})).is_err());
        assert!(handlers.validate(OperationType::CleanupDeadLinks, &json!({})).is_ok());
        assert!(handlers.validate(OperationType::CleanupDeadLinks, &json!([1, 2])).is_err());
        assert!(
            handlers
                .validate(
                    OperationType::UpdatePlacement,
                    &json!({"placement_id": "p", "fields": {"anchor_text": "x"}})
                )
                .is_ok()
        );
    }

    #[test]
    fn test_seeded_scores_are_reproducible() {
        let store: Arc<dyn PlacementStore> = Arc::new(MemoryStore::new());
        let events: Arc<dyn EventSink> = Arc::new(MemoryEventSink::new());
        let a = SimulatedPlacements::with_seed(store.clone(), events.clone(), 42);
        let b = SimulatedPlacements::with_seed(store, events, 42);
        let payload = json!({});
        assert_eq!(a.source_scores(&payload), b.source_scores(&payload));
    }
}
