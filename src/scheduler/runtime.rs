//! Per-campaign runtime state
//!
//! Queue, active set, status and metrics share one tokio mutex so enqueue,
//! dequeue and active-set bookkeeping never interleave.

use std::collections::VecDeque;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{Campaign, Operation, OperationStatus, OperationType, RuntimeStatus};
use crate::executor::ExecutionOutcome;
use crate::metrics::MetricsRecorder;

use super::active::ActiveSet;
use super::config::RuntimeConfig;
use super::queue::OperationQueue;
use super::retry::schedule_retry;

/// Mutable state of one campaign runtime
#[derive(Debug)]
pub(crate) struct RuntimeState {
    pub status: RuntimeStatus,
    pub config: RuntimeConfig,
    pub queue: OperationQueue,
    pub active: ActiveSet,
    pub metrics: MetricsRecorder,
    /// Finished operations, oldest first
    pub history: VecDeque<Operation>,
    /// Bumped on every start and stop; results from older epochs are dropped
    pub epoch: u64,
}

impl RuntimeState {
    fn fresh(config: RuntimeConfig, epoch: u64) -> Self {
        Self {
            status: RuntimeStatus::Active,
            queue: OperationQueue::new(),
            active: ActiveSet::new(),
            metrics: MetricsRecorder::new(config.metrics_window(), config.metrics_history_limit),
            history: VecDeque::new(),
            epoch,
            config,
        }
    }

    fn push_history(&mut self, operation: Operation) {
        debug_assert!(operation.status.is_terminal(), "history only holds finished operations");
        self.history.push_back(operation);
        while self.history.len() > self.config.metrics_history_limit.max(1) {
            self.history.pop_front();
        }
    }
}

/// What happened to a finished attempt
#[derive(Debug)]
pub(crate) enum Settled {
    /// Runtime was stopped or restarted while the attempt ran
    Discarded,
    Completed(Operation),
    RetryScheduled { operation: Operation, delay: Duration },
    Failed(Operation),
}

impl Settled {
    /// Event type and payload published for this outcome
    pub fn event(&self) -> Option<(&'static str, Value)> {
        match self {
            Self::Discarded => None,
            Self::Completed(op) => Some((
                "operation_completed",
                json!({
                    "operation_id": op.id,
                    "operation_type": op.op_type,
                    "duration_ms": op.duration_ms,
                    "result": op.result,
                }),
            )),
            Self::RetryScheduled { operation, delay } => Some((
                "operation_retry_scheduled",
                json!({
                    "operation_id": operation.id,
                    "operation_type": operation.op_type,
                    "retry_count": operation.retry_count,
                    "delay_ms": delay.as_millis() as u64,
                    "error": operation.error,
                }),
            )),
            Self::Failed(op) => Some((
                "operation_failed",
                json!({
                    "operation_id": op.id,
                    "operation_type": op.op_type,
                    "retry_count": op.retry_count,
                    "error": op.error,
                }),
            )),
        }
    }
}

/// One campaign's scheduling unit
#[derive(Debug)]
pub(crate) struct CampaignRuntime {
    pub campaign: Campaign,
    state: Mutex<RuntimeState>,
    idle: Notify,
    loop_task: Mutex<Option<AbortHandle>>,
}

impl CampaignRuntime {
    pub fn new(campaign: Campaign, config: RuntimeConfig) -> Self {
        debug!(campaign_id = %campaign.id, "CampaignRuntime::new: called");
        Self {
            campaign,
            state: Mutex::new(RuntimeState::fresh(config, 0)),
            idle: Notify::new(),
            loop_task: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.campaign.id
    }

    pub async fn lock(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().await
    }

    /// Replace all state with a fresh active runtime
    ///
    /// Only valid from `stopped`; returns the new epoch.
    pub async fn restart(&self, config: RuntimeConfig) -> Result<u64, RuntimeStatus> {
        debug!(campaign_id = %self.id(), "CampaignRuntime::restart: called");
        let mut state = self.state.lock().await;
        if state.status.is_live() {
            return Err(state.status);
        }
        let epoch = state.epoch + 1;
        *state = RuntimeState::fresh(config, epoch);
        Ok(epoch)
    }

    pub async fn set_loop_task(&self, handle: AbortHandle) {
        if let Some(previous) = self.loop_task.lock().await.replace(handle) {
            previous.abort();
        }
    }

    pub async fn abort_loop(&self) {
        debug!(campaign_id = %self.id(), "CampaignRuntime::abort_loop: called");
        if let Some(handle) = self.loop_task.lock().await.take() {
            handle.abort();
        }
    }

    /// Wake anything blocked in `wait_idle` so it re-checks the active set
    pub fn notify_idle(&self) {
        self.idle.notify_waiters();
    }

    /// Wait until the active set is empty or `timeout` elapses
    ///
    /// Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        debug!(campaign_id = %self.id(), ?timeout, "CampaignRuntime::wait_idle: called");
        let drained = async {
            loop {
                let notified = self.idle.notified();
                tokio::pin!(notified);
                // Register before checking so a wakeup between check and await is kept
                notified.as_mut().enable();
                if self.state.lock().await.active.is_empty() {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }

    /// Apply the outcome of an execution attempt
    ///
    /// Removes the operation from the active set, records metrics and either
    /// completes it, re-queues it with backoff or fails it terminally.
    pub async fn settle(&self, epoch: u64, operation_id: &str, outcome: ExecutionOutcome) -> Settled {
        debug!(campaign_id = %self.id(), %operation_id, epoch, "CampaignRuntime::settle: called");
        let mut state = self.state.lock().await;

        if state.epoch != epoch || state.status == RuntimeStatus::Stopped {
            debug!(%operation_id, "CampaignRuntime::settle: stale result, discarding");
            return Settled::Discarded;
        }

        let Some(entry) = state.active.remove(operation_id) else {
            debug!(%operation_id, "CampaignRuntime::settle: not in active set, discarding");
            return Settled::Discarded;
        };

        let now = Instant::now();
        state.metrics.record_completion(outcome.is_success(), outcome.duration, now);
        let active_ms = now.saturating_duration_since(entry.started).as_millis() as u64;
        debug!(%operation_id, active_ms, "CampaignRuntime::settle: left active set");

        let duration_ms = outcome.duration_ms();
        let mut operation = entry.operation;
        let settled = match outcome.result {
            Ok(result) => {
                operation.mark_completed(result, duration_ms);
                info!(
                    campaign_id = %self.id(),
                    operation_id = %operation.id,
                    op_type = %operation.op_type,
                    duration_ms,
                    "Operation completed"
                );
                if state.config.features.auto_verify {
                    queue_verification(&mut state, &operation, now);
                }
                state.push_history(operation.clone());
                Settled::Completed(operation)
            }
            Err(e) => {
                operation.mark_failed(e.to_string(), duration_ms);
                operation.status = OperationStatus::Retry;
                let policy = state.config.retry.clone();
                match schedule_retry(&mut operation, &policy) {
                    Some(delay) => {
                        info!(
                            campaign_id = %self.id(),
                            operation_id = %operation.id,
                            retry_count = operation.retry_count,
                            ?delay,
                            error = %e,
                            "Operation failed, retry scheduled"
                        );
                        state.queue.push(operation.clone(), now + delay);
                        Settled::RetryScheduled { operation, delay }
                    }
                    None => {
                        operation.status = OperationStatus::Failed;
                        warn!(
                            campaign_id = %self.id(),
                            operation_id = %operation.id,
                            op_type = %operation.op_type,
                            retry_count = operation.retry_count,
                            error = %e,
                            "Operation failed permanently"
                        );
                        state.push_history(operation.clone());
                        Settled::Failed(operation)
                    }
                }
            }
        };

        if state.active.is_empty() {
            self.notify_idle();
        }
        settled
    }
}

/// Queue a verify operation for a freshly created placement
fn queue_verification(state: &mut RuntimeState, created: &Operation, now: Instant) {
    if created.op_type != OperationType::CreatePlacement {
        return;
    }
    let Some(placement_id) = created
        .result
        .as_ref()
        .and_then(|r| r.get("placement_id"))
        .and_then(Value::as_str)
    else {
        debug!(operation_id = %created.id, "queue_verification: no placement id in result");
        return;
    };

    let verify = Operation::new(
        created.campaign_id.clone(),
        OperationType::VerifyPlacement,
        json!({ "placement_id": placement_id }),
        created.priority.saturating_sub(1),
        state.config.retry.max_retries,
        None,
    );
    debug!(operation_id = %verify.id, %placement_id, "queue_verification: queued");
    state.queue.push(verify, now);
}
