//! Upload orchestrator implementation.
//!
//! Drives one batch through `idle -> running -> completed | aborted`:
//! - Dispatch: a fixed number of workers pull items from a shared queue
//! - Collection: a single collector task owns the result collection
//! - Cancellation: `stop()` aborts the workers and fills in aborted reports

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::metrics;
use crate::report::{Report, ReportStatus, ReportsHandle};
use crate::summary::BatchOutcome;
use crate::uploader::Uploader;

use super::collector::{Collector, CollectorExit};
use super::counters::SharedCounters;
use super::types::{PoolState, PoolStatus, UploaderError};
use super::worker::{run_worker, JobQueue, WorkerContext};

/// Handles of a running batch.
struct ActivePool {
    counters: Arc<SharedCounters>,
    jobs: Arc<JobQueue>,
    workers: JoinSet<()>,
    collector: JoinHandle<CollectorExit>,
}

enum RunState {
    Idle,
    Running(ActivePool),
    Finished,
}

/// Uploads a fixed batch of items with a bounded pool of workers.
///
/// One instance runs one batch. Reports are pushed to the reports queue in
/// completion order as items finish; the final tallies are available through
/// [`outcome`](Self::outcome) and [`result`](Self::result) once the batch is
/// over.
///
/// # Example
///
/// ```ignore
/// let (reports, mut receiver) = create_reports_queue();
/// let uploader = SimulatedUploader::new(Duration::from_millis(100));
/// let orchestrator = UploadOrchestrator::new(files, 4, reports, Arc::new(uploader))?;
///
/// orchestrator.start().await?;
/// while orchestrator.is_active() {
///     if let Some(report) = receiver.recv_timeout(Duration::from_secs(1)).await {
///         println!("{}", report);
///     }
/// }
/// println!("{}", orchestrator.result().unwrap_or_default());
/// ```
pub struct UploadOrchestrator {
    run_id: Uuid,
    files: Arc<[String]>,
    threads_count: usize,
    reports: ReportsHandle,
    uploader: Arc<dyn Uploader>,

    // Runtime state
    busy: Arc<AtomicBool>,
    terminated: AtomicBool,
    outcome: Arc<OnceCell<BatchOutcome>>,
    finished: Arc<watch::Sender<bool>>,
    run: Mutex<RunState>,
}

impl UploadOrchestrator {
    /// Create a new orchestrator for `files`.
    ///
    /// Fails if `threads_count` is zero or an item appears twice.
    pub fn new(
        files: Vec<String>,
        threads_count: usize,
        reports: ReportsHandle,
        uploader: Arc<dyn Uploader>,
    ) -> Result<Self, UploaderError> {
        if threads_count == 0 {
            return Err(UploaderError::InvalidWorkerCount);
        }

        let mut seen = HashSet::with_capacity(files.len());
        for file in &files {
            if !seen.insert(file.as_str()) {
                return Err(UploaderError::DuplicateItem(file.clone()));
            }
        }

        let (finished, _) = watch::channel(false);

        Ok(Self {
            run_id: Uuid::new_v4(),
            files: files.into(),
            threads_count,
            reports,
            uploader,
            busy: Arc::new(AtomicBool::new(false)),
            terminated: AtomicBool::new(false),
            outcome: Arc::new(OnceCell::new()),
            finished: Arc::new(finished),
            run: Mutex::new(RunState::Idle),
        })
    }

    /// Start uploading.
    ///
    /// Spawns the workers and returns once the first of them has begun an
    /// upload. Does not wait for the batch to finish. An empty batch
    /// completes right away.
    pub async fn start(&self) -> Result<(), UploaderError> {
        let mut run = self.run.lock().await;
        if !matches!(*run, RunState::Idle) {
            warn!(run_id = %self.run_id, "Upload batch already started");
            return Err(UploaderError::AlreadyStarted);
        }

        let total_count = self.files.len();
        if total_count == 0 {
            info!(run_id = %self.run_id, "Empty upload batch, nothing to do");
            self.publish(BatchOutcome::new(&self.files, Vec::new(), false));
            metrics::BATCHES_TOTAL.with_label_values(&["completed"]).inc();
            self.finished.send_replace(true);
            *run = RunState::Finished;
            return Ok(());
        }

        info!(
            run_id = %self.run_id,
            total_count,
            threads_count = self.threads_count,
            uploader = self.uploader.name(),
            "Starting upload batch"
        );

        let counters = Arc::new(SharedCounters::new(total_count));
        let started = counters.start_signal();
        let jobs = Arc::new(JobQueue::new(self.files.iter().cloned()));
        let ctx = Arc::new(WorkerContext {
            counters: Arc::clone(&counters),
            uploader: Arc::clone(&self.uploader),
            reports: self.reports.clone(),
        });
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        self.busy.store(true, Ordering::SeqCst);

        let collector = tokio::spawn(
            Collector::new(
                completion_rx,
                Arc::clone(&self.files),
                Arc::clone(&self.busy),
                Arc::clone(&self.outcome),
                Arc::clone(&self.finished),
            )
            .run(),
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..self.threads_count {
            workers.spawn(run_worker(
                worker_id,
                Arc::clone(&ctx),
                Arc::clone(&jobs),
                completion_tx.clone(),
            ));
        }
        // Only workers hold senders, so the collector sees the channel close
        // once they are all gone.
        drop(completion_tx);

        // Registered before waiting so a dropped `start()` still leaves a
        // pool that `stop()` and `join()` can reach.
        *run = RunState::Running(ActivePool {
            counters,
            jobs,
            workers,
            collector,
        });
        drop(run);

        started.wait().await;
        debug!(run_id = %self.run_id, "First worker running");
        Ok(())
    }

    /// Forcibly stop the batch.
    ///
    /// In-flight uploads are cancelled without a report of their own; every
    /// item without a report gets an aborted one, pushed to the reports queue.
    /// An upload cancelled just before it would have finished is therefore
    /// recorded as aborted.
    pub async fn stop(&self) -> Result<(), UploaderError> {
        let mut run = self.run.lock().await;
        let mut pool = match std::mem::replace(&mut *run, RunState::Finished) {
            RunState::Running(pool) if self.outcome.get().is_none() => pool,
            RunState::Idle => {
                *run = RunState::Idle;
                warn!(run_id = %self.run_id, "Stop requested before start");
                return Err(UploaderError::NotStarted);
            }
            other => {
                *run = other;
                warn!(run_id = %self.run_id, "Stop requested but batch already finished");
                return Err(UploaderError::NotRunning);
            }
        };

        info!(
            run_id = %self.run_id,
            pending = pool.jobs.remaining(),
            "Stopping upload batch"
        );

        pool.workers.abort_all();
        while let Some(joined) = pool.workers.join_next().await {
            if let Err(e) = joined {
                if !e.is_cancelled() {
                    error!(run_id = %self.run_id, "Worker ended abnormally: {}", e);
                }
            }
        }

        let collected = match pool.collector.await {
            Ok(CollectorExit::Interrupted(reports)) => reports,
            Ok(CollectorExit::Completed) => {
                info!(run_id = %self.run_id, "Batch completed before the stop took effect");
                return Err(UploaderError::NotRunning);
            }
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        };

        let aborted = self.generate_aborted_reports(&collected);
        let aborted_count = aborted.len();
        let mut results = collected;
        results.extend(aborted);

        let outcome = BatchOutcome::new(&self.files, results, true);
        info!(
            run_id = %self.run_id,
            uploaded = outcome.uploaded_count(),
            errors = outcome.errors_count(),
            aborted = aborted_count,
            "Upload batch aborted"
        );
        self.publish(outcome);
        metrics::BATCHES_TOTAL.with_label_values(&["aborted"]).inc();

        self.busy.store(false, Ordering::SeqCst);
        self.terminated.store(true, Ordering::SeqCst);
        self.finished.send_replace(true);
        Ok(())
    }

    /// Wait until the batch is over.
    ///
    /// Returns once every item has reported, or right away if the batch was
    /// already stopped.
    pub async fn join(&self) -> Result<(), UploaderError> {
        if matches!(*self.run.lock().await, RunState::Idle) {
            return Err(UploaderError::NotStarted);
        }

        let mut finished = self.finished.subscribe();
        // The sender lives in `self`, so this only resolves on the flag.
        let _ = finished.wait_for(|done| *done).await;

        let mut run = self.run.lock().await;
        if let RunState::Running(pool) = std::mem::replace(&mut *run, RunState::Finished) {
            self.reap(pool).await;
        }
        Ok(())
    }

    /// Collects the handles of a batch that completed on its own.
    async fn reap(&self, mut pool: ActivePool) {
        while let Some(joined) = pool.workers.join_next().await {
            if let Err(e) = joined {
                error!(run_id = %self.run_id, "Worker ended abnormally: {}", e);
            }
        }
        match pool.collector.await {
            Ok(CollectorExit::Completed) => {
                debug!(run_id = %self.run_id, "Upload batch joined");
            }
            Ok(CollectorExit::Interrupted(reports)) => {
                error!(
                    run_id = %self.run_id,
                    collected = reports.len(),
                    "Collector ended without a complete batch"
                );
            }
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }

    /// Builds an aborted report for every item missing from `collected` and
    /// pushes it to the reports queue.
    fn generate_aborted_reports(&self, collected: &[Report]) -> Vec<Report> {
        let reported: HashSet<&str> = collected.iter().map(Report::filename).collect();
        let missing: Vec<&String> = self
            .files
            .iter()
            .filter(|file| !reported.contains(file.as_str()))
            .collect();

        let processed_count = collected.len();
        let errors_count = collected
            .iter()
            .filter(|r| matches!(r.status(), ReportStatus::Error { .. }))
            .count();
        let aborted_count = missing.len();

        missing
            .into_iter()
            .map(|file| {
                let report = Report::aborted(
                    file.as_str(),
                    self.files.len(),
                    processed_count,
                    errors_count,
                    aborted_count,
                );
                metrics::ITEMS_TOTAL.with_label_values(&["aborted"]).inc();
                self.reports.push(report.clone());
                report
            })
            .collect()
    }

    fn publish(&self, outcome: BatchOutcome) {
        if self.outcome.set(outcome).is_err() {
            panic!("batch outcome published twice");
        }
    }

    /// True while dispatch is outstanding.
    pub fn is_active(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// True iff the batch was ended by `stop()`.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Identifier of this batch, as seen in the logs.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn files_to_upload(&self) -> &[String] {
        &self.files
    }

    pub fn total_count(&self) -> usize {
        self.files.len()
    }

    pub fn threads_count(&self) -> usize {
        self.threads_count
    }

    /// Final tallies, once the batch is over.
    pub fn outcome(&self) -> Option<&BatchOutcome> {
        self.outcome.get()
    }

    /// Rendered summary, once the batch is over.
    pub fn result(&self) -> Option<String> {
        self.outcome.get().map(BatchOutcome::render)
    }

    /// Get the current batch status.
    pub async fn status(&self) -> PoolStatus {
        let run = self.run.lock().await;

        let mut status = PoolStatus {
            state: PoolState::Idle,
            busy: self.is_active(),
            terminated: self.is_terminated(),
            threads_count: self.threads_count,
            total_count: self.files.len(),
            processed_count: 0,
            uploaded_count: 0,
            errors_count: 0,
            aborted_count: 0,
        };

        if let Some(outcome) = self.outcome.get() {
            status.state = if outcome.is_terminated() {
                PoolState::Aborted
            } else {
                PoolState::Completed
            };
            status.processed_count = outcome.processed_count();
            status.uploaded_count = outcome.uploaded_count();
            status.errors_count = outcome.errors_count();
            status.aborted_count = outcome.aborted_count();
        } else if let RunState::Running(pool) = &*run {
            status.state = PoolState::Running;
            status.processed_count = pool.counters.processed();
            status.errors_count = pool.counters.errors();
            status.uploaded_count = status.processed_count.saturating_sub(status.errors_count);
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::create_reports_queue;
    use crate::testing::{fixtures, MockUploader};
    use std::time::Duration;

    fn orchestrator(
        n: usize,
        threads: usize,
        uploader: MockUploader,
    ) -> (UploadOrchestrator, crate::report::ReportsReceiver) {
        let (reports, receiver) = create_reports_queue();
        let orchestrator =
            UploadOrchestrator::new(fixtures::files(n), threads, reports, Arc::new(uploader))
                .unwrap();
        (orchestrator, receiver)
    }

    #[test]
    fn test_new_rejects_zero_workers() {
        let (reports, _receiver) = create_reports_queue();
        let result =
            UploadOrchestrator::new(fixtures::files(3), 0, reports, Arc::new(MockUploader::new()));
        assert_eq!(result.err(), Some(UploaderError::InvalidWorkerCount));
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let (reports, _receiver) = create_reports_queue();
        let files = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let result = UploadOrchestrator::new(files, 2, reports, Arc::new(MockUploader::new()));
        assert_eq!(
            result.err(),
            Some(UploaderError::DuplicateItem("a".to_string()))
        );
    }

    #[tokio::test]
    async fn test_idle_state() {
        let (orchestrator, _receiver) = orchestrator(3, 2, MockUploader::new());

        assert!(!orchestrator.is_active());
        assert!(!orchestrator.is_terminated());
        assert!(orchestrator.outcome().is_none());
        assert!(orchestrator.result().is_none());
        assert_eq!(orchestrator.total_count(), 3);
        assert_eq!(orchestrator.threads_count(), 2);

        let status = orchestrator.status().await;
        assert_eq!(status.state, PoolState::Idle);
        assert_eq!(status.total_count, 3);
    }

    #[tokio::test]
    async fn test_stop_and_join_before_start() {
        let (orchestrator, _receiver) = orchestrator(3, 2, MockUploader::new());
        assert_eq!(orchestrator.stop().await, Err(UploaderError::NotStarted));
        assert_eq!(orchestrator.join().await, Err(UploaderError::NotStarted));
        // Still startable afterwards
        assert!(orchestrator.start().await.is_ok());
        orchestrator.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_twice() {
        let (orchestrator, _receiver) = orchestrator(3, 2, MockUploader::new());
        orchestrator.start().await.unwrap();
        assert_eq!(orchestrator.start().await, Err(UploaderError::AlreadyStarted));
        orchestrator.join().await.unwrap();
        assert_eq!(orchestrator.start().await, Err(UploaderError::AlreadyStarted));
    }

    #[tokio::test]
    async fn test_start_marks_busy_and_started() {
        let uploader = MockUploader::new();
        uploader.set_duration(Duration::from_millis(200)).await;
        let (orchestrator, _receiver) = orchestrator(4, 2, uploader);

        orchestrator.start().await.unwrap();

        assert!(orchestrator.is_active());
        let status = orchestrator.status().await;
        assert_eq!(status.state, PoolState::Running);
        assert!(status.busy);

        orchestrator.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_natural_completion() {
        let (orchestrator, mut receiver) = orchestrator(6, 3, MockUploader::new());

        orchestrator.start().await.unwrap();
        orchestrator.join().await.unwrap();

        assert!(!orchestrator.is_active());
        assert!(!orchestrator.is_terminated());

        let outcome = orchestrator.outcome().unwrap();
        assert_eq!(outcome.uploaded_count(), 6);
        assert_eq!(outcome.aborted_count(), 0);
        assert_eq!(receiver.drain().len(), 6);

        let status = orchestrator.status().await;
        assert_eq!(status.state, PoolState::Completed);
        assert_eq!(status.processed_count, 6);
        assert!(orchestrator.result().unwrap().contains("Successfully Completed"));
    }

    #[tokio::test]
    async fn test_stop_after_completion_is_rejected() {
        let (orchestrator, _receiver) = orchestrator(2, 2, MockUploader::new());
        orchestrator.start().await.unwrap();
        orchestrator.join().await.unwrap();

        assert_eq!(orchestrator.stop().await, Err(UploaderError::NotRunning));
        assert!(!orchestrator.is_terminated());
        assert!(orchestrator.result().unwrap().contains("Successfully Completed"));
    }

    #[tokio::test]
    async fn test_stop_twice() {
        let uploader = MockUploader::new();
        uploader.set_completion_limit(1).await;
        let (orchestrator, _receiver) = orchestrator(4, 2, uploader);

        orchestrator.start().await.unwrap();
        orchestrator.stop().await.unwrap();
        assert_eq!(orchestrator.stop().await, Err(UploaderError::NotRunning));
        assert!(orchestrator.is_terminated());
    }

    #[tokio::test]
    async fn test_stop_synthesizes_aborted_reports() {
        let uploader = MockUploader::new();
        uploader.set_completion_limit(2).await;
        let (orchestrator, mut receiver) = orchestrator(6, 2, uploader);

        orchestrator.start().await.unwrap();
        for _ in 0..2 {
            receiver
                .recv_timeout(Duration::from_secs(5))
                .await
                .expect("report");
        }
        orchestrator.stop().await.unwrap();

        assert!(!orchestrator.is_active());
        assert!(orchestrator.is_terminated());

        let outcome = orchestrator.outcome().unwrap();
        assert_eq!(outcome.uploaded_count(), 2);
        assert_eq!(outcome.aborted_count(), 4);

        let queued = receiver.drain();
        assert_eq!(queued.len(), 4);
        for report in &queued {
            assert_eq!(report.status_label(), "aborted");
            assert_eq!(report.aborted_count(), 4);
            assert_eq!(report.processed_count(), Some(2));
        }

        let status = orchestrator.status().await;
        assert_eq!(status.state, PoolState::Aborted);
        assert_eq!(status.aborted_count, 4);
        assert!(orchestrator.result().unwrap().contains("WARNING: ABORTED!"));
    }

    #[tokio::test]
    async fn test_join_returns_after_stop() {
        let uploader = MockUploader::new();
        uploader.set_completion_limit(0).await;
        let (orchestrator, _receiver) = orchestrator(3, 1, uploader);
        let orchestrator = Arc::new(orchestrator);

        orchestrator.start().await.unwrap();

        let joiner = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.join().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        orchestrator.stop().await.unwrap();

        let joined = tokio::time::timeout(Duration::from_secs(5), joiner)
            .await
            .expect("join should return after stop")
            .unwrap();
        assert!(joined.is_ok());
        assert_eq!(orchestrator.outcome().unwrap().aborted_count(), 3);
    }

    #[tokio::test]
    async fn test_dropped_start_leaves_stoppable_batch() {
        let uploader = MockUploader::new();
        uploader.set_completion_limit(0).await;
        let (orchestrator, mut receiver) = orchestrator(5, 2, uploader);

        {
            let start = orchestrator.start();
            tokio::pin!(start);
            // Caller gives up after the first poll
            let _ = futures::poll!(&mut start);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(orchestrator.is_active());
        assert_eq!(orchestrator.start().await, Err(UploaderError::AlreadyStarted));
        assert_eq!(orchestrator.status().await.state, PoolState::Running);

        orchestrator.stop().await.unwrap();
        assert!(!orchestrator.is_active());
        orchestrator.join().await.unwrap();

        assert_eq!(orchestrator.outcome().unwrap().aborted_count(), 5);
        assert_eq!(receiver.drain().len(), 5);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (orchestrator, mut receiver) = orchestrator(0, 4, MockUploader::new());

        orchestrator.start().await.unwrap();
        orchestrator.join().await.unwrap();

        assert!(!orchestrator.is_active());
        assert_eq!(orchestrator.outcome().unwrap().total_count(), 0);
        assert!(receiver.is_empty());
        assert_eq!(orchestrator.stop().await, Err(UploaderError::NotRunning));
    }

    #[tokio::test]
    async fn test_more_workers_than_items() {
        let (orchestrator, _receiver) = orchestrator(2, 8, MockUploader::new());
        orchestrator.start().await.unwrap();
        orchestrator.join().await.unwrap();
        assert_eq!(orchestrator.outcome().unwrap().uploaded_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let uploader = MockUploader::new();
        uploader.set_duration(Duration::from_millis(20)).await;
        let (orchestrator, _receiver) = orchestrator(12, 3, uploader.clone());

        orchestrator.start().await.unwrap();
        orchestrator.join().await.unwrap();

        assert!(uploader.max_in_flight() <= 3);
        assert_eq!(uploader.call_count().await, 12);
    }
}
