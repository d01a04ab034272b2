//! Common error types used across the workspace.
//!
//! The pipeline itself is failure-silent (sentinels and dropped requests,
//! not errors); these types cover the edges where failure is real:
//! startup configuration and the persistence port.

use crate::id::ItemId;

/// Base error enum for homeguard.
#[derive(Debug, thiserror::Error)]
pub enum HomeguardError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("settings persistence failed")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Startup-time registry/configuration invariant violations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("item identifier is empty")]
    EmptyId,

    #[error("duplicate item identifier: {0}")]
    DuplicateId(ItemId),

    #[error("identifier {0} is reserved for the controller")]
    ReservedId(ItemId),
}
