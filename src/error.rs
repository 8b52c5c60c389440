use thiserror::Error;

use crate::dao::storage::StorageError;

/// Errors surfaced by the lifecycle, roster, and selection services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The storage backend failed; callers retry at the next poll.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// The caller supplied a value the domain rejects outright.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The game is not in a state that permits the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The game, signup, or player the caller named does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}
