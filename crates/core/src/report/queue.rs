//! Unbounded FIFO carrying reports from workers to an external consumer.

use std::time::Duration;

use tokio::sync::mpsc;

use super::Report;

/// Push side of the reports queue.
///
/// This is cheaply cloneable and shared by every worker of a run. Pushing
/// never blocks.
#[derive(Debug, Clone)]
pub struct ReportsHandle {
    tx: mpsc::UnboundedSender<Report>,
}

impl ReportsHandle {
    /// Create a new handle from a channel sender
    pub fn new(tx: mpsc::UnboundedSender<Report>) -> Self {
        Self { tx }
    }

    /// Push a report onto the queue.
    ///
    /// Returns false if the consumer side is gone; the report is dropped and
    /// the caller carries on.
    pub fn push(&self, report: Report) -> bool {
        match self.tx.send(report) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Reports queue closed, dropping report for {}", e.0.filename());
                false
            }
        }
    }
}

/// Consumer side of the reports queue.
#[derive(Debug)]
pub struct ReportsReceiver {
    rx: mpsc::UnboundedReceiver<Report>,
}

impl ReportsReceiver {
    pub fn new(rx: mpsc::UnboundedReceiver<Report>) -> Self {
        Self { rx }
    }

    /// Wait for the next report.
    ///
    /// Returns `None` once every handle has been dropped and the queue is empty.
    pub async fn recv(&mut self) -> Option<Report> {
        self.rx.recv().await
    }

    /// Wait up to `timeout` for the next report.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Report> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Take the next report if one is already queued.
    pub fn try_recv(&mut self) -> Option<Report> {
        self.rx.try_recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Number of reports waiting in the queue.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Take every report currently queued without waiting.
    pub fn drain(&mut self) -> Vec<Report> {
        let mut reports = Vec::with_capacity(self.len());
        while let Ok(report) = self.rx.try_recv() {
            reports.push(report);
        }
        reports
    }
}

/// Create a reports queue
///
/// Returns:
/// - `ReportsHandle` - pass this to the orchestrator
/// - `ReportsReceiver` - poll this from the consumer
pub fn create_reports_queue() -> (ReportsHandle, ReportsReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReportsHandle::new(tx), ReportsReceiver::new(rx))
}
