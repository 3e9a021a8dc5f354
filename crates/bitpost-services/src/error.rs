//! Errors reported by store collaborators.

use bitpost_core::InventoryVector;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A message from this inventory vector is already stored.
    /// Duplicate network delivery, not a failure.
    #[error("message from object {0} already stored")]
    AlreadyStored(InventoryVector),

    #[error("no stored entry with id {0}")]
    NotFound(u64),

    #[error("message has not been stored yet")]
    NotStored,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
