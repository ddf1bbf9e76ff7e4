//! Final tallies of a batch and the human-readable summary.

use std::collections::HashSet;
use std::fmt::{self, Write};

use serde::Serialize;

use crate::report::{Report, ReportStatus};

const SEPARATOR: &str = "---";

/// Filenames of a finished batch, split by outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultBuckets {
    pub uploaded: Vec<String>,
    pub errored: Vec<String>,
    pub aborted: Vec<String>,
}

impl ResultBuckets {
    pub fn len(&self) -> usize {
        self.uploaded.len() + self.errored.len() + self.aborted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The complete result collection of one batch.
///
/// Holds exactly one final report per input item, in completion order (with
/// synthesized aborted reports appended after a forced stop).
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    total_count: usize,
    terminated: bool,
    reports: Vec<Report>,
}

impl BatchOutcome {
    /// Builds the outcome for `files` from their reports.
    ///
    /// # Panics
    ///
    /// Panics if the reports do not partition `files`: a missing, duplicate,
    /// unknown or non-final report means the pool lost track of an item.
    pub fn new(files: &[String], reports: Vec<Report>, terminated: bool) -> Self {
        assert_eq!(
            reports.len(),
            files.len(),
            "result collection holds {} reports for {} items",
            reports.len(),
            files.len()
        );

        let known: HashSet<&str> = files.iter().map(String::as_str).collect();
        let mut seen = HashSet::with_capacity(reports.len());
        for report in &reports {
            assert!(
                report.is_final(),
                "report for {} was never finished",
                report.filename()
            );
            assert!(
                known.contains(report.filename()),
                "report for unknown item {}",
                report.filename()
            );
            assert!(
                seen.insert(report.filename()),
                "duplicate report for {}",
                report.filename()
            );
        }

        Self {
            total_count: files.len(),
            terminated,
            reports,
        }
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// True if the batch ended through a forced stop.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn uploaded_count(&self) -> usize {
        self.count(|s| matches!(s, ReportStatus::Done { .. }))
    }

    pub fn errors_count(&self) -> usize {
        self.count(|s| matches!(s, ReportStatus::Error { .. }))
    }

    pub fn aborted_count(&self) -> usize {
        self.count(|s| matches!(s, ReportStatus::Aborted { .. }))
    }

    /// Items that produced a report through their own upload.
    pub fn processed_count(&self) -> usize {
        self.uploaded_count() + self.errors_count()
    }

    fn count(&self, pred: impl Fn(&ReportStatus) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(r.status())).count()
    }

    /// Partitions the reports into uploaded, errored and aborted filenames.
    pub fn calc_result(&self) -> ResultBuckets {
        let mut buckets = ResultBuckets::default();
        for report in &self.reports {
            let name = report.filename().to_string();
            match report.status() {
                ReportStatus::Done { .. } => buckets.uploaded.push(name),
                ReportStatus::Error { .. } => buckets.errored.push(name),
                ReportStatus::Aborted { .. } => buckets.aborted.push(name),
                ReportStatus::Uploading => {}
            }
        }
        buckets
    }

    /// Banner line; a forced stop takes precedence over errors.
    pub fn banner(&self) -> &'static str {
        if self.terminated {
            "WARNING: ABORTED!"
        } else if self.errors_count() > 0 {
            "WARNING: ERRORS!"
        } else {
            "Successfully Completed"
        }
    }

    /// Renders the final summary block.
    pub fn render(&self) -> String {
        let mut uploaded = Vec::new();
        let mut errored = Vec::new();
        let mut aborted = Vec::new();
        for report in &self.reports {
            match report.status() {
                ReportStatus::Done { .. } => uploaded.push(format!(
                    "Filename: {}, status: {}",
                    report.filename(),
                    report.status()
                )),
                ReportStatus::Error { message, .. } => errored.push(format!(
                    "Filename: {}, status: {}: {}",
                    report.filename(),
                    report.status(),
                    message
                )),
                ReportStatus::Aborted { .. } => aborted.push(format!(
                    "Filename: {}, status: {}",
                    report.filename(),
                    report.status()
                )),
                ReportStatus::Uploading => {}
            }
        }

        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.banner());
        let _ = writeln!(out);
        let _ = writeln!(out, "Total results:");
        let _ = writeln!(out, "{SEPARATOR}");
        let _ = writeln!(out, "Uploaded files:");
        let _ = writeln!(out, "{}", uploaded.join("\n"));
        let _ = writeln!(out, "{SEPARATOR}");
        let _ = writeln!(out, "Not uploaded files:");
        let _ = writeln!(out, "{}", errored.join("\n"));
        let _ = writeln!(out, "{}", aborted.join("\n"));
        let _ = writeln!(out, "{SEPARATOR}");
        let _ = writeln!(out, "Total files: {}", self.total_count);
        let _ = writeln!(out, "Done: {}", self.uploaded_count());
        let _ = writeln!(out, "Errors: {}", self.errors_count());
        let _ = writeln!(out, "Aborted: {}", self.aborted_count());
        out
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
