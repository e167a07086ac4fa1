//! Scheduler implementation

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::collaborators::{EventSink, PlacementStore, emit_event};
use crate::domain::{Campaign, CampaignStatus, Operation, OperationType, RuntimeStatus};
use crate::executor::{HandlerContext, HandlerError, PlacementHandler, SimulatedPlacements, execute};
use crate::metrics::{OPERATIONS_PER_MINUTE, RUNTIME_SUCCESS_RATE, RuntimeMetricsSnapshot};

use super::config::{QualityThresholds, RuntimeConfig, RuntimeConfigOverrides};
use super::error::RuntimeError;
use super::queue::ready_instant;
use super::runtime::CampaignRuntime;

/// Injected collaborators shared with every spawned task
#[derive(Clone)]
struct Collaborators {
    store: Arc<dyn PlacementStore>,
    events: Arc<dyn EventSink>,
    handler: Arc<dyn PlacementHandler>,
}

impl Collaborators {
    async fn signal_status(&self, campaign_id: &str, status: CampaignStatus) {
        if let Err(e) = self.store.set_campaign_status(campaign_id, status).await {
            warn!(%campaign_id, %status, error = %e, "Failed to record campaign status");
        }
    }
}

/// Per-campaign operation scheduler
///
/// Owns one [`CampaignRuntime`] per started campaign. Each runtime has its own
/// tick loop; campaigns share nothing except this registry.
pub struct Scheduler {
    defaults: RuntimeConfig,
    collaborators: Collaborators,
    runtimes: RwLock<HashMap<String, Arc<CampaignRuntime>>>,
}

impl Scheduler {
    /// Create a scheduler with the given collaborators and default runtime config
    pub fn new(
        store: Arc<dyn PlacementStore>,
        events: Arc<dyn EventSink>,
        handler: Arc<dyn PlacementHandler>,
        defaults: RuntimeConfig,
    ) -> Self {
        debug!(?defaults, "Scheduler::new: called");
        Self {
            defaults,
            collaborators: Collaborators { store, events, handler },
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    /// Scheduler running the simulated placement handlers against `store`
    pub fn simulated(
        store: Arc<dyn PlacementStore>,
        events: Arc<dyn EventSink>,
        defaults: RuntimeConfig,
        seed: Option<u64>,
    ) -> Self {
        debug!(?seed, "Scheduler::simulated: called");
        let handler: Arc<dyn PlacementHandler> = match seed {
            Some(seed) => Arc::new(SimulatedPlacements::with_seed(store.clone(), events.clone(), seed)),
            None => Arc::new(SimulatedPlacements::new(store.clone(), events.clone())),
        };
        Self::new(store, events, handler, defaults)
    }

    async fn runtime(&self, campaign_id: &str) -> Option<Arc<CampaignRuntime>> {
        self.runtimes.read().await.get(campaign_id).cloned()
    }

    /// Start a campaign's runtime and its tick loop
    ///
    /// A stopped runtime is restarted from fresh state.
    pub async fn start_runtime(
        &self,
        campaign: Campaign,
        overrides: Option<RuntimeConfigOverrides>,
    ) -> Result<(), RuntimeError> {
        let campaign_id = campaign.id.clone();
        debug!(%campaign_id, ?overrides, "Scheduler::start_runtime: called");

        let config = match &overrides {
            Some(overrides) => self.defaults.merged(overrides),
            None => self.defaults.clone(),
        };
        config.validate()?;
        let tick_interval = config.tick_interval();
        let realtime_events = config.features.realtime_events;
        let batch_size = config.batch_size;

        let runtime = {
            let mut runtimes = self.runtimes.write().await;
            match runtimes.get(&campaign_id) {
                Some(existing) => {
                    debug!(%campaign_id, "Scheduler::start_runtime: existing runtime, restarting");
                    existing
                        .restart(config)
                        .await
                        .map_err(|status| RuntimeError::AlreadyRunning {
                            campaign_id: campaign_id.clone(),
                            status,
                        })?;
                    existing.clone()
                }
                None => {
                    debug!(%campaign_id, "Scheduler::start_runtime: new runtime");
                    let runtime = Arc::new(CampaignRuntime::new(campaign, config));
                    runtimes.insert(campaign_id.clone(), runtime.clone());
                    runtime
                }
            }
        };

        let handle = tokio::spawn(run_loop(runtime.clone(), self.collaborators.clone(), tick_interval));
        runtime.set_loop_task(handle.abort_handle()).await;

        info!(%campaign_id, batch_size, ?tick_interval, "Campaign runtime started");
        self.collaborators.signal_status(&campaign_id, CampaignStatus::Active).await;
        if realtime_events {
            emit_event(
                self.collaborators.events.as_ref(),
                &campaign_id,
                "runtime_started",
                json!({ "batch_size": batch_size, "tick_interval_ms": tick_interval.as_millis() as u64 }),
            )
            .await;
        }
        Ok(())
    }

    /// Stop a campaign's runtime, draining in-flight work up to the drain timeout
    ///
    /// Returns false when there was no live runtime to stop.
    pub async fn stop_runtime(&self, campaign_id: &str) -> bool {
        debug!(%campaign_id, "Scheduler::stop_runtime: called");
        let Some(runtime) = self.runtime(campaign_id).await else {
            debug!(%campaign_id, "Scheduler::stop_runtime: unknown campaign");
            return false;
        };

        let (drain_timeout, realtime_events) = {
            let mut state = runtime.lock().await;
            if !state.status.accepts_work() {
                debug!(%campaign_id, status = %state.status, "Scheduler::stop_runtime: not live, nothing to do");
                return false;
            }
            state.status = RuntimeStatus::Stopping;
            (state.config.drain_timeout(), state.config.features.realtime_events)
        };
        info!(%campaign_id, ?drain_timeout, "Stopping campaign runtime");

        let drained = runtime.wait_idle(drain_timeout).await;
        runtime.abort_loop().await;

        let (discarded, abandoned) = {
            let mut state = runtime.lock().await;
            let discarded = state.queue.clear().len();
            let abandoned = state.active.clear(false);
            state.status = RuntimeStatus::Stopped;
            state.epoch += 1;
            (discarded, abandoned)
        };

        if !drained {
            warn!(%campaign_id, abandoned, ?drain_timeout, "Drain timeout elapsed, abandoning in-flight operations");
        }
        if discarded > 0 {
            info!(%campaign_id, discarded, "Discarded pending operations");
        }
        info!(%campaign_id, "Campaign runtime stopped");

        self.collaborators.signal_status(campaign_id, CampaignStatus::Paused).await;
        if realtime_events {
            emit_event(
                self.collaborators.events.as_ref(),
                campaign_id,
                "runtime_stopped",
                json!({ "drained": drained, "discarded": discarded, "abandoned": abandoned }),
            )
            .await;
        }
        true
    }

    /// Stop every live runtime concurrently, returning how many were stopped
    pub async fn stop_all(&self) -> usize {
        debug!("Scheduler::stop_all: called");
        let ids: Vec<String> = self.runtimes.read().await.keys().cloned().collect();
        let results = futures::future::join_all(ids.iter().map(|id| self.stop_runtime(id))).await;
        let stopped = results.into_iter().filter(|stopped| *stopped).count();
        info!(stopped, "Stopped all campaign runtimes");
        stopped
    }

    /// Suspend dispatching without touching queued or in-flight work
    pub async fn pause_runtime(&self, campaign_id: &str) -> bool {
        debug!(%campaign_id, "Scheduler::pause_runtime: called");
        self.transition(campaign_id, RuntimeStatus::Active, RuntimeStatus::Paused, CampaignStatus::Paused)
            .await
    }

    pub async fn resume_runtime(&self, campaign_id: &str) -> bool {
        debug!(%campaign_id, "Scheduler::resume_runtime: called");
        self.transition(campaign_id, RuntimeStatus::Paused, RuntimeStatus::Active, CampaignStatus::Active)
            .await
    }

    async fn transition(
        &self,
        campaign_id: &str,
        from: RuntimeStatus,
        to: RuntimeStatus,
        signal: CampaignStatus,
    ) -> bool {
        let Some(runtime) = self.runtime(campaign_id).await else {
            return false;
        };
        let realtime_events = {
            let mut state = runtime.lock().await;
            if state.status != from {
                debug!(%campaign_id, status = %state.status, %to, "Scheduler::transition: not applicable");
                return false;
            }
            state.status = to;
            state.config.features.realtime_events
        };

        info!(%campaign_id, %from, %to, "Campaign runtime status changed");
        self.collaborators.signal_status(campaign_id, signal).await;
        if realtime_events {
            let event_type = match to {
                RuntimeStatus::Paused => "runtime_paused",
                _ => "runtime_resumed",
            };
            emit_event(self.collaborators.events.as_ref(), campaign_id, event_type, json!({})).await;
        }
        true
    }

    /// Add an operation to a campaign's queue, returning its id
    pub async fn enqueue_operation(
        &self,
        campaign_id: &str,
        op_type: OperationType,
        payload: Value,
        priority: i32,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<String, RuntimeError> {
        debug!(%campaign_id, %op_type, priority, ?scheduled_at, "Scheduler::enqueue_operation: called");

        self.collaborators
            .handler
            .validate(op_type, &payload)
            .map_err(|e| RuntimeError::InvalidPayload {
                op_type,
                reason: match e {
                    HandlerError::InvalidPayload(reason) => reason,
                    other => other.to_string(),
                },
            })?;

        let runtime = self
            .runtime(campaign_id)
            .await
            .ok_or_else(|| RuntimeError::not_running(campaign_id))?;

        let mut state = runtime.lock().await;
        if !state.status.accepts_work() {
            debug!(%campaign_id, status = %state.status, "Scheduler::enqueue_operation: runtime not accepting work");
            return Err(RuntimeError::not_running(campaign_id));
        }

        let operation = Operation::new(
            campaign_id,
            op_type,
            payload,
            priority,
            state.config.retry.max_retries,
            scheduled_at,
        );
        let id = operation.id.clone();
        let ready_at = ready_instant(operation.scheduled_at, Utc::now(), Instant::now());
        state.queue.push(operation, ready_at);
        debug!(%campaign_id, operation_id = %id, queue_depth = state.queue.len(), "Operation enqueued");
        Ok(id)
    }

    /// Remove a still-queued operation; in-flight operations cannot be cancelled
    pub async fn cancel_operation(&self, campaign_id: &str, operation_id: &str) -> bool {
        debug!(%campaign_id, %operation_id, "Scheduler::cancel_operation: called");
        let Some(runtime) = self.runtime(campaign_id).await else {
            return false;
        };
        let removed = runtime.lock().await.queue.remove(operation_id).is_some();
        if removed {
            info!(%campaign_id, %operation_id, "Operation cancelled");
        }
        removed
    }

    /// Queued operations in dispatch order
    pub async fn get_queue(&self, campaign_id: &str) -> Vec<Operation> {
        match self.runtime(campaign_id).await {
            Some(runtime) => runtime.lock().await.queue.snapshot(),
            None => Vec::new(),
        }
    }

    /// Executing operations in dispatch order
    pub async fn get_active(&self, campaign_id: &str) -> Vec<Operation> {
        match self.runtime(campaign_id).await {
            Some(runtime) => runtime.lock().await.active.snapshot(),
            None => Vec::new(),
        }
    }

    /// Metrics snapshots, oldest first
    pub async fn get_metrics(&self, campaign_id: &str) -> Vec<RuntimeMetricsSnapshot> {
        match self.runtime(campaign_id).await {
            Some(runtime) => runtime.lock().await.metrics.snapshots(),
            None => Vec::new(),
        }
    }

    /// Completed and terminally failed operations, oldest first
    pub async fn get_history(&self, campaign_id: &str) -> Vec<Operation> {
        match self.runtime(campaign_id).await {
            Some(runtime) => runtime.lock().await.history.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn status(&self, campaign_id: &str) -> RuntimeStatus {
        match self.runtime(campaign_id).await {
            Some(runtime) => runtime.lock().await.status,
            None => RuntimeStatus::Stopped,
        }
    }

    pub async fn is_active(&self, campaign_id: &str) -> bool {
        self.status(campaign_id).await == RuntimeStatus::Active
    }

    /// Run one scheduling pass now, returning how many operations were dispatched
    pub async fn tick(&self, campaign_id: &str) -> usize {
        debug!(%campaign_id, "Scheduler::tick: called");
        match self.runtime(campaign_id).await {
            Some(runtime) => run_tick(&runtime, &self.collaborators).await,
            None => 0,
        }
    }

    /// Take a metrics snapshot now and forward it to persistence
    pub async fn sample_metrics(&self, campaign_id: &str) -> Option<RuntimeMetricsSnapshot> {
        debug!(%campaign_id, "Scheduler::sample_metrics: called");
        let runtime = self.runtime(campaign_id).await?;
        Some(sample_and_forward(&runtime, &self.collaborators).await)
    }

    /// Release all state for a campaign, aborting its loop and in-flight tasks
    pub async fn cleanup(&self, campaign_id: &str) -> bool {
        debug!(%campaign_id, "Scheduler::cleanup: called");
        let Some(runtime) = self.runtimes.write().await.remove(campaign_id) else {
            debug!(%campaign_id, "Scheduler::cleanup: unknown campaign");
            return false;
        };

        runtime.abort_loop().await;
        let (aborted, discarded) = {
            let mut state = runtime.lock().await;
            let aborted = state.active.clear(true);
            let discarded = state.queue.clear().len();
            state.status = RuntimeStatus::Stopped;
            state.epoch += 1;
            (aborted, discarded)
        };
        // A stop blocked in its drain sees the empty active set and returns
        runtime.notify_idle();
        info!(%campaign_id, aborted, discarded, "Campaign runtime released");
        true
    }
}

/// Per-campaign tick loop; runs until its abort handle fires
async fn run_loop(runtime: Arc<CampaignRuntime>, collaborators: Collaborators, period: Duration) {
    debug!(campaign_id = %runtime.id(), ?period, "run_loop: called");
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        run_tick(&runtime, &collaborators).await;
    }
}

/// Dispatch whatever fits, then sample metrics; no-op unless active
async fn run_tick(runtime: &Arc<CampaignRuntime>, collaborators: &Collaborators) -> usize {
    let Some(dispatched) = dispatch_ready(runtime, collaborators).await else {
        debug!(campaign_id = %runtime.id(), "run_tick: runtime not active, skipping");
        return 0;
    };
    sample_and_forward(runtime, collaborators).await;
    dispatched
}

/// Move eligible operations into the active set and spawn their execution
///
/// Returns `None` when the runtime is not active.
async fn dispatch_ready(runtime: &Arc<CampaignRuntime>, collaborators: &Collaborators) -> Option<usize> {
    let mut state = runtime.lock().await;
    if state.status != RuntimeStatus::Active {
        return None;
    }

    let capacity = state.config.batch_size.saturating_sub(state.active.len());
    if capacity == 0 {
        debug!(campaign_id = %runtime.id(), active = state.active.len(), "dispatch_ready: at capacity");
        return Some(0);
    }

    let now = Instant::now();
    let ready = state.queue.dequeue_eligible(capacity, now);
    let epoch = state.epoch;
    let thresholds = state.config.thresholds.clone();
    let realtime_events = state.config.features.realtime_events;
    let dispatched = ready.len();

    for mut operation in ready {
        operation.mark_processing();
        let id = operation.id.clone();
        state.active.insert(operation.clone(), now);
        // The task blocks on this lock until the abort handle is attached
        let handle = tokio::spawn(run_operation(
            runtime.clone(),
            collaborators.clone(),
            epoch,
            operation,
            thresholds.clone(),
            realtime_events,
        ));
        state.active.attach(&id, handle.abort_handle());
    }

    if dispatched > 0 {
        debug!(
            campaign_id = %runtime.id(),
            dispatched,
            active = state.active.len(),
            queued = state.queue.len(),
            "dispatch_ready: dispatched"
        );
    }
    Some(dispatched)
}

/// Execute one operation and apply its outcome
async fn run_operation(
    runtime: Arc<CampaignRuntime>,
    collaborators: Collaborators,
    epoch: u64,
    operation: Operation,
    thresholds: QualityThresholds,
    realtime_events: bool,
) {
    let ctx = HandlerContext::for_operation(&operation, &thresholds);
    let outcome = execute(collaborators.handler.as_ref(), &ctx, &operation.payload).await;
    let settled = runtime.settle(epoch, &operation.id, outcome).await;

    if realtime_events && let Some((event_type, payload)) = settled.event() {
        emit_event(collaborators.events.as_ref(), runtime.id(), event_type, payload).await;
    }
}

/// Sample metrics and forward the headline series on a detached task
async fn sample_and_forward(runtime: &CampaignRuntime, collaborators: &Collaborators) -> RuntimeMetricsSnapshot {
    let snapshot = {
        let mut state = runtime.lock().await;
        let active = state.active.len();
        let queue_depth = state.queue.len();
        state.metrics.sample(active, queue_depth, Instant::now())
    };

    let store = collaborators.store.clone();
    let campaign_id = runtime.id().to_string();
    let forwarded = snapshot.clone();
    tokio::spawn(async move {
        let metadata = json!({
            "active_count": forwarded.active_count,
            "queue_depth": forwarded.queue_depth,
            "failed_count": forwarded.failed_count,
            "average_duration_ms": forwarded.average_duration_ms,
        });
        let series = [
            (OPERATIONS_PER_MINUTE, forwarded.operations_per_minute),
            (RUNTIME_SUCCESS_RATE, forwarded.success_rate),
        ];
        for (name, value) in series {
            if let Err(e) = store.append_metric(&campaign_id, name, value, metadata.clone()).await {
                warn!(%campaign_id, metric = name, error = %e, "Failed to persist runtime metric");
            }
        }
    });

    snapshot
}
