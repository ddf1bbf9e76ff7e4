//! Single owner of a run's result collection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::metrics;
use crate::report::Report;
use crate::summary::BatchOutcome;

/// How the collector's input ended.
#[derive(Debug)]
pub(crate) enum CollectorExit {
    /// Every item reported; the outcome has been published.
    Completed,
    /// The workers went away first (forced stop). Carries what was collected.
    Interrupted(Vec<Report>),
}

/// Receives reports in completion order and appends them to the collection.
///
/// When the collection reaches the batch size the collector publishes the
/// outcome, clears `busy` and signals `finished`. It never marks the batch as
/// terminated.
pub(crate) struct Collector {
    rx: mpsc::UnboundedReceiver<Report>,
    files: Arc<[String]>,
    busy: Arc<AtomicBool>,
    outcome: Arc<OnceCell<BatchOutcome>>,
    finished: Arc<watch::Sender<bool>>,
}

impl Collector {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Report>,
        files: Arc<[String]>,
        busy: Arc<AtomicBool>,
        outcome: Arc<OnceCell<BatchOutcome>>,
        finished: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            rx,
            files,
            busy,
            outcome,
            finished,
        }
    }

    pub async fn run(mut self) -> CollectorExit {
        let total_count = self.files.len();
        let mut results = Vec::with_capacity(total_count);

        while let Some(report) = self.rx.recv().await {
            debug!(
                item = report.filename(),
                collected = results.len() + 1,
                total_count,
                "Collected report"
            );
            results.push(report);

            if results.len() == total_count {
                let outcome = BatchOutcome::new(&self.files, results, false);
                info!(
                    uploaded = outcome.uploaded_count(),
                    errors = outcome.errors_count(),
                    "Upload batch completed"
                );
                if self.outcome.set(outcome).is_err() {
                    panic!("batch outcome published twice");
                }
                metrics::BATCHES_TOTAL.with_label_values(&["completed"]).inc();
                self.busy.store(false, Ordering::SeqCst);
                self.finished.send_replace(true);
                return CollectorExit::Completed;
            }
        }

        debug!(
            collected = results.len(),
            total_count, "Workers gone before the batch completed"
        );
        CollectorExit::Interrupted(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        tx: mpsc::UnboundedSender<Report>,
        busy: Arc<AtomicBool>,
        outcome: Arc<OnceCell<BatchOutcome>>,
        finished: Arc<watch::Sender<bool>>,
        collector: Collector,
    }

    fn harness(n: usize) -> Harness {
        let files: Arc<[String]> = (0..n).map(|i| format!("file{}", i)).collect();
        let (tx, rx) = mpsc::unbounded_channel();
        let busy = Arc::new(AtomicBool::new(true));
        let outcome = Arc::new(OnceCell::new());
        let (finished, _) = watch::channel(false);
        let finished = Arc::new(finished);
        let collector = Collector::new(
            rx,
            files,
            Arc::clone(&busy),
            Arc::clone(&outcome),
            Arc::clone(&finished),
        );
        Harness {
            tx,
            busy,
            outcome,
            finished,
            collector,
        }
    }

    #[tokio::test]
    async fn test_completes_at_total() {
        let h = harness(2);
        let task = tokio::spawn(h.collector.run());

        h.tx.send(Report::uploading("file1", 2).into_done(1, 0)).unwrap();
        h.tx.send(Report::uploading("file0", 2).into_error(2, 1, "boom"))
            .unwrap();

        let exit = task.await.unwrap();
        assert!(matches!(exit, CollectorExit::Completed));
        assert!(!h.busy.load(Ordering::SeqCst));
        assert!(*h.finished.borrow());

        let outcome = h.outcome.get().expect("outcome published");
        assert!(!outcome.is_terminated());
        // Completion order is kept
        assert_eq!(outcome.reports()[0].filename(), "file1");
        assert_eq!(outcome.errors_count(), 1);
    }

    #[tokio::test]
    async fn test_interrupted_when_senders_drop() {
        let h = harness(3);
        let task = tokio::spawn(h.collector.run());

        h.tx.send(Report::uploading("file0", 3).into_done(1, 0)).unwrap();
        drop(h.tx);

        match task.await.unwrap() {
            CollectorExit::Interrupted(reports) => {
                assert_eq!(reports.len(), 1);
                assert_eq!(reports[0].filename(), "file0");
            }
            CollectorExit::Completed => panic!("batch should not complete"),
        }
        assert!(h.busy.load(Ordering::SeqCst));
        assert!(h.outcome.get().is_none());
        assert!(!*h.finished.borrow());
    }
}
