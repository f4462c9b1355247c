//! Error types for the todo store and its storage port.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by [`TodoStore`](crate::store::TodoStore) operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A positional id outside `[0, len)` was passed to a mutator. The
    /// sequence is left untouched.
    #[error("todo id {id} out of range (list has {len} records)")]
    IdOutOfRange { id: usize, len: usize },

    /// The persisted blob under `key` did not decode.
    #[error("persisted list under key {key:?} is corrupt")]
    CorruptStore {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory list failed to encode. Not expected with well-formed
    /// records; kept distinct from decode corruption.
    #[error("failed to encode todo list")]
    Encode(#[source] serde_json::Error),

    /// The storage adapter failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
