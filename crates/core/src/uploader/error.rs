//! Error types for the uploader module.

use thiserror::Error;

/// Failure of a single item upload.
///
/// Item failures never escape the worker: they are turned into an
/// [`crate::report::ReportStatus::Error`] and counted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    /// Failure injected by the simulated uploader.
    #[error("Emulated error")]
    Emulated,

    /// Any other failure, carried as a message.
    #[error("{0}")]
    Other(String),
}
