//! External collaborators consumed by the runtime
//!
//! - [`PlacementStore`] - placement records, campaign status and metric series
//! - [`EventSink`] - real-time status events for the dashboard
//!
//! Production implementations live outside this crate; [`MemoryStore`] and
//! [`MemoryEventSink`] are in-process stand-ins.

mod error;
mod memory;
mod notification;
mod persistence;

pub use error::{CollaboratorError, CollaboratorResult};
pub use memory::{MemoryEventSink, MemoryStore, MetricPoint, RecordedEvent};
pub use notification::{EventSink, emit_event};
pub use persistence::PlacementStore;
