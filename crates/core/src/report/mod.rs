//! Reports and the queue they travel through.

mod queue;
mod types;

pub use queue::{create_reports_queue, ReportsHandle, ReportsReceiver};
pub use types::{Report, ReportStatus};
