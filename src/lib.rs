//! campaign-runtime - per-campaign operation scheduler
//!
//! Each started campaign gets its own runtime: a priority queue of pending
//! placement operations, an active set bounded by `batch_size`, and a tick
//! loop that moves work between them. Failed operations are retried with
//! exponential backoff; every tick samples rolling throughput and success
//! metrics.
//!
//! # Modules
//!
//! - [`scheduler`] - lifecycle control, queueing, dispatch and retry
//! - [`executor`] - handler trait, dispatch by operation type, simulated handlers
//! - [`metrics`] - rolling per-campaign metrics
//! - [`collaborators`] - persistence and notification interfaces
//! - [`domain`] - operations, campaigns and placement records
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod executor;
pub mod metrics;
pub mod scheduler;

// Re-export commonly used types
pub use collaborators::{CollaboratorError, EventSink, MemoryEventSink, MemoryStore, PlacementStore};
pub use config::{Config, SimulationConfig};
pub use domain::{
    Campaign, CampaignStatus, Operation, OperationStatus, OperationType, PlacementRecord, PlacementStatus,
    RuntimeStatus,
};
pub use executor::{ExecutionOutcome, HandlerContext, HandlerError, HandlerResult, PlacementHandler, SimulatedPlacements};
pub use metrics::{MetricsRecorder, RuntimeMetricsSnapshot};
pub use scheduler::{RetryPolicy, RuntimeConfig, RuntimeConfigOverrides, RuntimeError, Scheduler};
