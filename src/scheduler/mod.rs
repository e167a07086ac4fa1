//! Campaign runtime scheduler
//!
//! Owns per-campaign runtimes: a priority queue of pending operations, an
//! active set bounded by `batch_size`, a tick loop that moves work from one to
//! the other, and retry with exponential backoff.

mod active;
mod config;
mod core;
mod error;
mod queue;
mod retry;
mod runtime;

pub use active::{ActiveEntry, ActiveSet};
pub use config::{FeatureFlags, QualityThresholds, RetryPolicy, RuntimeConfig, RuntimeConfigOverrides};
pub use core::Scheduler;
pub use error::RuntimeError;
pub use queue::{OperationQueue, QueuedOperation, ready_instant};
pub use retry::{backoff_delay, schedule_retry};
