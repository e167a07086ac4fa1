//! Retry manager - exponential backoff for failed operations

use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::domain::{Operation, OperationStatus};

use super::config::RetryPolicy;

/// Delay before the `retry_number`-th retry (1-based)
///
/// `base * 2^(retry_number - 1)`, capped at the policy maximum.
pub fn backoff_delay(policy: &RetryPolicy, retry_number: u32) -> Duration {
    let exponent = retry_number.saturating_sub(1).min(63);
    let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
    Duration::from_millis(policy.base_backoff_ms.saturating_mul(factor)).min(policy.max_backoff())
}

/// Prepare a failed operation for another attempt
///
/// Increments the retry count, pushes `scheduled_at` out by the backoff delay
/// and resets the status to pending. Returns the delay so the caller can set
/// the queue eligibility instant. Returns `None` when the retry budget is spent;
/// the operation is left untouched in that case.
pub fn schedule_retry(operation: &mut Operation, policy: &RetryPolicy) -> Option<Duration> {
    debug!(id = %operation.id, retry_count = operation.retry_count, "schedule_retry: called");
    if !operation.has_retries_left() {
        debug!(id = %operation.id, "schedule_retry: retries exhausted");
        return None;
    }

    operation.retry_count += 1;
    let delay = backoff_delay(policy, operation.retry_count);
    let delay_chrono = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
    operation.scheduled_at = Utc::now().checked_add_signed(delay_chrono).unwrap_or(operation.scheduled_at);
    operation.status = OperationStatus::Pending;
    operation.started_at = None;

    debug!(id = %operation.id, retry_count = operation.retry_count, ?delay, "schedule_retry: rescheduled");
    Some(delay)
}
