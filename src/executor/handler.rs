//! Placement handler trait

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{Operation, OperationType};
use crate::scheduler::QualityThresholds;

use super::error::HandlerError;

/// Result of a handler call
pub type HandlerResult = Result<Value, HandlerError>;

/// What a handler knows about the operation it runs
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub campaign_id: String,
    pub operation_id: String,
    pub op_type: OperationType,
    pub priority: i32,
    /// Retries already spent (0 on the first attempt)
    pub attempt: u32,
    pub thresholds: QualityThresholds,
}

impl HandlerContext {
    pub fn for_operation(operation: &Operation, thresholds: &QualityThresholds) -> Self {
        Self {
            campaign_id: operation.campaign_id.clone(),
            operation_id: operation.id.clone(),
            op_type: operation.op_type,
            priority: operation.priority,
            attempt: operation.retry_count,
            thresholds: thresholds.clone(),
        }
    }
}

/// Side effects behind each operation type
///
/// One method per type. Implementations talk to collaborators only and hold
/// no scheduling logic, so real crawling/posting can replace the simulated
/// handlers without touching the scheduler.
#[async_trait]
pub trait PlacementHandler: Send + Sync {
    async fn create_placement(&self, ctx: &HandlerContext, payload: &Value) -> HandlerResult;

    async fn remove_placement(&self, ctx: &HandlerContext, payload: &Value) -> HandlerResult;

    async fn update_placement(&self, ctx: &HandlerContext, payload: &Value) -> HandlerResult;

    async fn verify_placement(&self, ctx: &HandlerContext, payload: &Value) -> HandlerResult;

    async fn cleanup_dead_links(&self, ctx: &HandlerContext, payload: &Value) -> HandlerResult;

    /// Synchronous payload check run at enqueue time
    ///
    /// Accepts everything by default, leaving shape errors to execution.
    fn validate(&self, _op_type: OperationType, _payload: &Value) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Route an operation to the handler method for its type
pub async fn dispatch(handler: &dyn PlacementHandler, ctx: &HandlerContext, payload: &Value) -> HandlerResult {
    match ctx.op_type {
        OperationType::CreatePlacement => handler.create_placement(ctx, payload).await,
        OperationType::RemovePlacement => handler.remove_placement(ctx, payload).await,
        OperationType::UpdatePlacement => handler.update_placement(ctx, payload).await,
        OperationType::VerifyPlacement => handler.verify_placement(ctx, payload).await,
        OperationType::CleanupDeadLinks => handler.cleanup_dead_links(ctx, payload).await,
    }
}

/// Read a required string field from a payload object
pub fn required_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str, HandlerError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerError::missing_field(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl PlacementHandler for EchoHandler {
        async fn create_placement(&self, _ctx: &HandlerContext, _payload: &Value) -> HandlerResult {
            Ok(json!("create"))
        }
        async fn remove_placement(&self, _ctx: &HandlerContext, _payload: &Value) -> HandlerResult {
            Ok(json!("remove"))
        }
        async fn update_placement(&self, _ctx: &HandlerContext, _payload: &Value) -> HandlerResult {
            Ok(json!("update"))
        }
        async fn verify_placement(&self, _ctx: &HandlerContext, _payload: &Value) -> HandlerResult {
            Ok(json!("verify"))
        }
        async fn cleanup_dead_links(&self, _ctx: &HandlerContext, _payload: &Value) -> HandlerResult {
            Ok(json!("cleanup"))
        }
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_type() {
        let expected = ["create", "remove", "update", "verify", "cleanup"];
        for (op_type, want) in OperationType::ALL.into_iter().zip(expected) {
            let op = Operation::new("camp-1", op_type, json!({}), 0, 0, None);
            let ctx = HandlerContext::for_operation(&op, &QualityThresholds::default());
            let got = dispatch(&EchoHandler, &ctx, &op.payload).await.unwrap();
            assert_eq!(got, json!(want));
        }
    }

    #[test]
    fn test_default_validate_accepts_anything() {
        assert!(EchoHandler.validate(OperationType::RemovePlacement, &json!(null)).is_ok());
    }

    #[test]
    fn test_required_str() {
        let payload = json!({"placement_id": "p-1", "empty": ""});
        assert_eq!(required_str(&payload, "placement_id").unwrap(), "p-1");
        assert!(required_str(&payload, "empty").is_err());
        assert!(required_str(&payload, "missing").is_err());
    }
}
