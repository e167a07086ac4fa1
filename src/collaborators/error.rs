//! Collaborator error types

use thiserror::Error;

/// Errors reported by the persistence or notification collaborators
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Result of a collaborator call
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;
