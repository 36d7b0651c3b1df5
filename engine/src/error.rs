//! Error types for the Tidepool engine.

use crate::record::Table;
use crate::EntityId;
use thiserror::Error;

/// All possible errors from the Tidepool engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Event errors
    #[error("change event missing row: {0}")]
    MissingRow(String),

    #[error("change event old row carries no id")]
    MissingId,

    #[error("table mismatch: expected {expected}, got {got}")]
    TableMismatch { expected: Table, got: Table },

    #[error("undecodable row payload: {0}")]
    InvalidPayload(String),

    // Collection errors
    #[error("duplicate entity: {0}")]
    DuplicateEntity(EntityId),

    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    // Mutation errors
    #[error("mutation already pending for entity: {0}")]
    MutationPending(EntityId),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
