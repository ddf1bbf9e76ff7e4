//! Types for the upload pool.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by pool operations called out of order or with bad input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploaderError {
    /// The pool needs at least one worker.
    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    /// The batch lists the same item more than once.
    #[error("duplicate item in batch: {0}")]
    DuplicateItem(String),

    /// `start()` was already called on this instance.
    #[error("upload batch already started")]
    AlreadyStarted,

    /// The operation needs a started batch.
    #[error("upload batch not started")]
    NotStarted,

    /// The batch has already finished, naturally or by an earlier stop.
    #[error("upload batch is not running")]
    NotRunning,
}

/// Lifecycle state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    Idle,
    Running,
    /// Every item reported on its own.
    Completed,
    /// Ended by `stop()`.
    Aborted,
}

impl PoolState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PoolState::Completed | PoolState::Aborted)
    }
}

/// Point-in-time view of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    pub state: PoolState,
    /// True while dispatch is outstanding.
    pub busy: bool,
    /// True iff the batch was ended by `stop()`.
    pub terminated: bool,
    pub threads_count: usize,
    pub total_count: usize,
    /// Items that finished their upload, successfully or not.
    pub processed_count: usize,
    pub uploaded_count: usize,
    pub errors_count: usize,
    pub aborted_count: usize,
}
