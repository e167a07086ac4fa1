//! Rolling runtime metrics for one campaign
//!
//! Tracks completions inside a look-back window and keeps a capped ring
//! buffer of point-in-time snapshots.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

/// Metric series names forwarded to persistence
pub const OPERATIONS_PER_MINUTE: &str = "operations_per_minute";
pub const RUNTIME_SUCCESS_RATE: &str = "runtime_success_rate";

/// Point-in-time sample of a campaign runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Finished attempts in the window, scaled to one minute
    pub operations_per_minute: f64,
    /// Percentage of finished attempts in the window that succeeded
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub active_count: usize,
    /// Failed attempts in the window
    pub failed_count: usize,
    pub queue_depth: usize,
}

/// One finished attempt
#[derive(Debug, Clone, Copy)]
struct Completion {
    finished: Instant,
    success: bool,
    duration: Duration,
}

/// Per-campaign metrics state
#[derive(Debug)]
pub struct MetricsRecorder {
    window: Duration,
    limit: usize,
    completions: VecDeque<Completion>,
    snapshots: VecDeque<RuntimeMetricsSnapshot>,
    total_completed: u64,
    total_failed: u64,
}

impl MetricsRecorder {
    pub fn new(window: Duration, limit: usize) -> Self {
        debug!(?window, limit, "MetricsRecorder::new: called");
        Self {
            window,
            limit: limit.max(1),
            completions: VecDeque::new(),
            snapshots: VecDeque::new(),
            total_completed: 0,
            total_failed: 0,
        }
    }

    /// Record a finished attempt
    pub fn record_completion(&mut self, success: bool, duration: Duration, finished: Instant) {
        debug!(success, duration_ms = duration.as_millis() as u64, "MetricsRecorder::record_completion: called");
        if success {
            self.total_completed += 1;
        } else {
            self.total_failed += 1;
        }
        self.completions.push_back(Completion {
            finished,
            success,
            duration,
        });
        self.prune(finished);
    }

    /// Compute a snapshot at `now` and append it to the ring buffer
    pub fn sample(&mut self, active_count: usize, queue_depth: usize, now: Instant) -> RuntimeMetricsSnapshot {
        debug!(active_count, queue_depth, "MetricsRecorder::sample: called");
        self.prune(now);

        let finished = self.completions.len();
        let failed_count = self.completions.iter().filter(|c| !c.success).count();
        let succeeded = finished - failed_count;

        let success_rate = if finished == 0 {
            100.0
        } else {
            succeeded as f64 * 100.0 / finished as f64
        };

        let average_duration_ms = if finished == 0 {
            0.0
        } else {
            self.completions.iter().map(|c| c.duration.as_millis() as f64).sum::<f64>() / finished as f64
        };

        let window_minutes = self.window.as_secs_f64() / 60.0;
        let operations_per_minute = if window_minutes > 0.0 {
            finished as f64 / window_minutes
        } else {
            0.0
        };

        let snapshot = RuntimeMetricsSnapshot {
            timestamp: Utc::now(),
            operations_per_minute,
            success_rate,
            average_duration_ms,
            active_count,
            failed_count,
            queue_depth,
        };

        self.snapshots.push_back(snapshot.clone());
        while self.snapshots.len() > self.limit {
            self.snapshots.pop_front();
        }

        snapshot
    }

    /// Snapshots oldest first
    pub fn snapshots(&self) -> Vec<RuntimeMetricsSnapshot> {
        self.snapshots.iter().cloned().collect()
    }

    /// Lifetime successful attempts
    pub fn total_completed(&self) -> u64 {
        self.total_completed
    }

    /// Lifetime failed attempts
    pub fn total_failed(&self) -> u64 {
        self.total_failed
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.completions.front() {
            if now.saturating_duration_since(front.finished) > self.window {
                self.completions.pop_front();
            } else {
                break;
            }
        }
    }
}
