//! The per-item outcome record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one item, with the tally snapshots taken when it was emitted.
///
/// Each case carries only the fields that are meaningful for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportStatus {
    /// Work has begun. Never published to the queue or the result collection.
    Uploading,
    Done {
        processed_count: usize,
        errors_count: usize,
    },
    Error {
        processed_count: usize,
        errors_count: usize,
        message: String,
    },
    /// Synthesized by a forced stop for an item that never reported.
    Aborted {
        processed_count: usize,
        errors_count: usize,
        aborted_count: usize,
    },
}

impl ReportStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReportStatus::Uploading => "uploading",
            ReportStatus::Done { .. } => "done",
            ReportStatus::Error { .. } => "error",
            ReportStatus::Aborted { .. } => "aborted",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Report describing one item's outcome.
///
/// A report is built in the `Uploading` state and moved into its final state
/// by value, so a published report never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    filename: String,
    total_count: usize,
    reported_at: DateTime<Utc>,
    #[serde(flatten)]
    status: ReportStatus,
}

impl Report {
    /// Starts a report for an item that is about to be uploaded.
    pub fn uploading(filename: impl Into<String>, total_count: usize) -> Self {
        Self {
            filename: filename.into(),
            total_count,
            reported_at: Utc::now(),
            status: ReportStatus::Uploading,
        }
    }

    /// Builds the stand-in report for an item cut off by a forced stop.
    pub fn aborted(
        filename: impl Into<String>,
        total_count: usize,
        processed_count: usize,
        errors_count: usize,
        aborted_count: usize,
    ) -> Self {
        Self {
            filename: filename.into(),
            total_count,
            reported_at: Utc::now(),
            status: ReportStatus::Aborted {
                processed_count,
                errors_count,
                aborted_count,
            },
        }
    }

    /// Finishes the report as a successful upload.
    pub fn into_done(self, processed_count: usize, errors_count: usize) -> Self {
        self.finish(ReportStatus::Done {
            processed_count,
            errors_count,
        })
    }

    /// Finishes the report as a failed upload.
    pub fn into_error(
        self,
        processed_count: usize,
        errors_count: usize,
        message: impl Into<String>,
    ) -> Self {
        self.finish(ReportStatus::Error {
            processed_count,
            errors_count,
            message: message.into(),
        })
    }

    fn finish(mut self, status: ReportStatus) -> Self {
        self.status = status;
        self.reported_at = Utc::now();
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn reported_at(&self) -> DateTime<Utc> {
        self.reported_at
    }

    pub fn status(&self) -> &ReportStatus {
        &self.status
    }

    pub fn status_label(&self) -> &'static str {
        self.status.label()
    }

    /// True once the report has left the `Uploading` state.
    pub fn is_final(&self) -> bool {
        !matches!(self.status, ReportStatus::Uploading)
    }

    /// Processed tally snapshot; `None` while uploading.
    pub fn processed_count(&self) -> Option<usize> {
        match self.status {
            ReportStatus::Uploading => None,
            ReportStatus::Done {
                processed_count, ..
            }
            | ReportStatus::Error {
                processed_count, ..
            }
            | ReportStatus::Aborted {
                processed_count, ..
            } => Some(processed_count),
        }
    }

    /// Error tally snapshot; `None` while uploading.
    pub fn errors_count(&self) -> Option<usize> {
        match self.status {
            ReportStatus::Uploading => None,
            ReportStatus::Done { errors_count, .. }
            | ReportStatus::Error { errors_count, .. }
            | ReportStatus::Aborted { errors_count, .. } => Some(errors_count),
        }
    }

    /// Abort tally snapshot; zero for anything but an aborted report.
    pub fn aborted_count(&self) -> usize {
        match self.status {
            ReportStatus::Aborted { aborted_count, .. } => aborted_count,
            _ => 0,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            ReportStatus::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// One-line progress summary, e.g.
    /// `Processed 3 of 20 files with 1 errors and 0 aborted.`
    pub fn progress(&self) -> String {
        format!(
            "Processed {} of {} files with {} errors and {} aborted.",
            self.processed_count().unwrap_or(0),
            self.total_count,
            self.errors_count().unwrap_or(0),
            self.aborted_count()
        )
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}. {}", self.filename, self.status, self.progress())
    }
}
