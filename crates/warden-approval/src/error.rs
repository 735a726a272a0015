// error.rs — Error types for the approval workflow.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by approval operations.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// No request with this id exists.
    #[error("approval request {0} not found")]
    NotFound(Uuid),

    /// The request was already resolved. Resolution is single-writer,
    /// first-resolution-wins; the duplicate decision is rejected.
    #[error("approval request {id} already resolved as '{state}'")]
    AlreadyResolved { id: Uuid, state: String },
}
