//! Runtime metrics
//!
//! Each campaign owns a [`MetricsRecorder`]; the scheduler samples it every
//! tick and forwards the headline series to persistence.

mod recorder;

pub use recorder::{MetricsRecorder, OPERATIONS_PER_MINUTE, RUNTIME_SUCCESS_RATE, RuntimeMetricsSnapshot};
