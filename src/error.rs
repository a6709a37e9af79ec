//! Error taxonomy for the task list store
//!
//! Only `InvalidFilterMode` is ever returned to a caller. The persistence
//! variants are logged and kept on the store so the front end can show a
//! notice; blank input and unknown ids are silent no-ops with no variant.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid filter mode: {0:?} (expected all, completed or pending)")]
    InvalidFilterMode(String),

    #[error("failed to write task list to slot {key:?}: {message}")]
    PersistenceWriteFailure { key: String, message: String },

    #[error("discarded unreadable task list in slot {key:?}: {message}")]
    PersistenceReadCorrupt { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
