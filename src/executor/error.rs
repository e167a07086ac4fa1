//! Handler error types

use thiserror::Error;

use crate::collaborators::CollaboratorError;

/// Errors raised while executing an operation
///
/// The executor does not distinguish transient from permanent failures;
/// every variant goes through the same retry budget.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn missing_field(field: &str) -> Self {
        Self::InvalidPayload(format!("missing required field '{}'", field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = HandlerError::missing_field("placement_id");
        assert_eq!(err.to_string(), "Invalid payload: missing required field 'placement_id'");
    }

    #[test]
    fn test_from_collaborator_error() {
        let err: HandlerError = CollaboratorError::Unavailable("down".to_string()).into();
        assert!(matches!(err, HandlerError::Collaborator(_)));
        assert!(err.to_string().contains("down"));
    }
}
