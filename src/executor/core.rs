//! Operation executor - runs one handler call and measures it

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error};

use super::error::HandlerError;
use super::handler::{HandlerContext, HandlerResult, PlacementHandler, dispatch};

/// Outcome of one execution attempt
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub result: HandlerResult,
    pub duration: Duration,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

/// Dispatch an operation to its handler
///
/// Handler errors and panics both come back as a failed outcome; nothing
/// escapes to the caller.
pub async fn execute(handler: &dyn PlacementHandler, ctx: &HandlerContext, payload: &Value) -> ExecutionOutcome {
    debug!(operation_id = %ctx.operation_id, op_type = %ctx.op_type, attempt = ctx.attempt, "execute: called");
    let started = Instant::now();

    let result = match AssertUnwindSafe(dispatch(handler, ctx, payload)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(operation_id = %ctx.operation_id, op_type = %ctx.op_type, %message, "Handler panicked");
            Err(HandlerError::Panicked(message))
        }
    };

    let outcome = ExecutionOutcome {
        result,
        duration: started.elapsed(),
    };
    debug!(
        operation_id = %ctx.operation_id,
        success = outcome.is_success(),
        duration_ms = outcome.duration_ms(),
        "execute: finished"
    );
    outcome
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
