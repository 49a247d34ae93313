//! # World Error Types
//!
//! Gameplay-facing mutations report failure as `false`; these types cover
//! configuration, persistence and scheduled work.

use std::path::PathBuf;

use thiserror::Error;

pub use strata_procedural::ConfigError;

use strata_procedural::ChunkCoord;

/// Errors from a [`WorldStore`](crate::store::WorldStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend I/O failed.
    #[error("store I/O failed for {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// Stored payload could not be encoded or decoded.
    #[error("malformed ledger payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Stored key is not a valid chunk or block coordinate.
    #[error("malformed coordinate key: {0:?}")]
    BadKey(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of one scheduled task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Chunk was evicted or disposed before the task ran.
    #[error("chunk {0} is no longer loaded")]
    ChunkGone(ChunkCoord),

    /// Chunk is not in the state the stage expects.
    #[error("chunk {coord} is {found}, expected {expected}")]
    WrongState {
        /// Chunk involved.
        coord: ChunkCoord,
        /// State the stage requires.
        expected: &'static str,
        /// State actually found.
        found: &'static str,
    },
}

/// Result type for scheduled tasks.
pub type TaskResult = Result<(), TaskError>;
