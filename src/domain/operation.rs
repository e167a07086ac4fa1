//! Operation - one scheduled unit of placement work

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// Kind of placement work an operation performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    CreatePlacement,
    RemovePlacement,
    UpdatePlacement,
    VerifyPlacement,
    CleanupDeadLinks,
}

impl OperationType {
    /// All operation types, in declaration order
    pub const ALL: [OperationType; 5] = [
        Self::CreatePlacement,
        Self::RemovePlacement,
        Self::UpdatePlacement,
        Self::VerifyPlacement,
        Self::CleanupDeadLinks,
    ];
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreatePlacement => write!(f, "create_placement"),
            Self::RemovePlacement => write!(f, "remove_placement"),
            Self::UpdatePlacement => write!(f, "update_placement"),
            Self::VerifyPlacement => write!(f, "verify_placement"),
            Self::CleanupDeadLinks => write!(f, "cleanup_dead_links"),
        }
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "create_placement" => Ok(Self::CreatePlacement),
            "remove_placement" => Ok(Self::RemovePlacement),
            "update_placement" => Ok(Self::UpdatePlacement),
            "verify_placement" => Ok(Self::VerifyPlacement),
            "cleanup_dead_links" => Ok(Self::CleanupDeadLinks),
            _ => Err(format!("Unknown operation type: {}", s)),
        }
    }
}

/// Operation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    /// Failed attempt handed to the retry manager
    Retry,
}

impl OperationStatus {
    /// Completed or permanently failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Retry => write!(f, "retry"),
        }
    }
}

/// A unit of work owned by exactly one of a campaign's queue or active set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub campaign_id: String,
    pub op_type: OperationType,
    pub priority: i32,
    pub status: OperationStatus,
    pub scheduled_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Operation {
    /// Create a pending operation eligible at `scheduled_at` (now when `None`)
    pub fn new(
        campaign_id: impl Into<String>,
        op_type: OperationType,
        payload: Value,
        priority: i32,
        max_retries: u32,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        let campaign_id = campaign_id.into();
        debug!(%campaign_id, %op_type, priority, "Operation::new: called");
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            campaign_id,
            op_type,
            priority,
            status: OperationStatus::Pending,
            scheduled_at: scheduled_at.unwrap_or(now),
            retry_count: 0,
            max_retries,
            payload,
            result: None,
            error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }

    /// Mark the operation as handed to the executor
    pub fn mark_processing(&mut self) {
        debug!(id = %self.id, "Operation::mark_processing: called");
        self.status = OperationStatus::Processing;
        self.started_at = Some(Utc::now());
        self.error = None;
    }

    /// Record a successful handler result
    pub fn mark_completed(&mut self, result: Value, duration_ms: u64) {
        debug!(id = %self.id, duration_ms, "Operation::mark_completed: called");
        self.status = OperationStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
        self.duration_ms = Some(duration_ms);
    }

    /// Record a failed attempt
    pub fn mark_failed(&mut self, error: impl Into<String>, duration_ms: u64) {
        let error = error.into();
        debug!(id = %self.id, %error, duration_ms, "Operation::mark_failed: called");
        self.status = OperationStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        self.duration_ms = Some(duration_ms);
    }

    /// Whether another attempt is allowed after a failure
    pub fn has_retries_left(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_operation_is_pending() {
        let op = Operation::new("camp-1", OperationType::CreatePlacement, json!({}), 5, 3, None);
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 0);
        assert_eq!(op.max_retries, 3);
        assert!(op.started_at.is_none());
        assert!(op.scheduled_at <= Utc::now());
    }

    #[test]
    fn test_operation_ids_are_unique() {
        let a = Operation::new("camp-1", OperationType::VerifyPlacement, json!({}), 0, 0, None);
        let b = Operation::new("camp-1", OperationType::VerifyPlacement, json!({}), 0, 0, None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_status_transitions() {
        let mut op = Operation::new("camp-1", OperationType::RemovePlacement, json!({}), 0, 1, None);
        op.mark_processing();
        assert_eq!(op.status, OperationStatus::Processing);
        assert!(op.started_at.is_some());

        op.mark_failed("boom", 12);
        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.error.as_deref(), Some("boom"));
        assert!(op.has_retries_left());

        op.retry_count = 1;
        assert!(!op.has_retries_left());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OperationStatus::Completed.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
        assert!(!OperationStatus::Retry.is_terminal());
        assert!(!OperationStatus::Pending.is_terminal());
    }

    #[test]
    fn test_operation_type_parse() {
        assert_eq!(
            "create-placement".parse::<OperationType>().unwrap(),
            OperationType::CreatePlacement
        );
        assert_eq!(
            "CLEANUP_DEAD_LINKS".parse::<OperationType>().unwrap(),
            OperationType::CleanupDeadLinks
        );
        assert!("post".parse::<OperationType>().is_err());
    }

    #[test]
    fn test_operation_type_serde() {
        let json = serde_json::to_string(&OperationType::VerifyPlacement).unwrap();
        assert_eq!(json, "\"verify_placement\"");
        for op_type in OperationType::ALL {
            assert_eq!(op_type.to_string().parse::<OperationType>().unwrap(), op_type);
        }
    }
}
