//! Scheduler error types

use thiserror::Error;

use crate::domain::{OperationType, RuntimeStatus};

/// Errors returned by the scheduler's control surface
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Campaign {campaign_id} already has a runtime ({status})")]
    AlreadyRunning { campaign_id: String, status: RuntimeStatus },

    #[error("Campaign {campaign_id} has no running runtime")]
    NotRunning { campaign_id: String },

    #[error("Invalid runtime config: {0}")]
    InvalidConfig(String),

    #[error("Invalid {op_type} payload: {reason}")]
    InvalidPayload { op_type: OperationType, reason: String },
}

impl RuntimeError {
    pub fn not_running(campaign_id: &str) -> Self {
        Self::NotRunning {
            campaign_id: campaign_id.to_string(),
        }
    }
}
