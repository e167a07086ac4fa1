//! Operation executor
//!
//! Dispatches an operation to the [`PlacementHandler`] method for its type,
//! catches errors and panics at the boundary and measures duration. The
//! scheduler decides what happens next (complete, retry or fail).

mod core;
mod error;
mod handler;
mod simulated;

pub use core::{ExecutionOutcome, execute};
pub use error::HandlerError;
pub use handler::{HandlerContext, HandlerResult, PlacementHandler, dispatch, required_str};
pub use simulated::{DEFAULT_STALE_AFTER_DAYS, SimulatedPlacements};
