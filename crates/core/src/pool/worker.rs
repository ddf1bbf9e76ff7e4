//! Per-item execution unit and the worker loop that drives it.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::metrics;
use crate::report::{Report, ReportsHandle};
use crate::uploader::{UploadError, Uploader};

use super::counters::SharedCounters;

/// Everything a worker needs to process items of one run.
pub(crate) struct WorkerContext {
    pub counters: Arc<SharedCounters>,
    pub uploader: Arc<dyn Uploader>,
    pub reports: ReportsHandle,
}

/// Items of a run that no worker has picked up yet.
#[derive(Debug, Default)]
pub(crate) struct JobQueue {
    items: Mutex<VecDeque<String>>,
}

impl JobQueue {
    pub fn new(items: impl IntoIterator<Item = String>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().collect()),
        }
    }

    pub fn next(&self) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Keeps the active-workers gauge honest when an upload is cancelled.
struct ActiveGuard;

impl ActiveGuard {
    fn enter() -> Self {
        metrics::WORKERS_ACTIVE.inc();
        Self
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        metrics::WORKERS_ACTIVE.dec();
    }
}

/// Uploads one item and publishes its report.
///
/// Never fails: an upload error (or a panicking uploader) becomes an `error`
/// report. On success the error tally is read before the processed tally is
/// bumped; on failure processed is bumped before errors.
pub(crate) async fn upload_item(ctx: &WorkerContext, item: &str) -> Report {
    if ctx.counters.try_set_started() {
        debug!("First upload started");
    }

    let report = Report::uploading(item, ctx.counters.total_count());
    let started = Instant::now();

    let result = {
        let _active = ActiveGuard::enter();
        AssertUnwindSafe(ctx.uploader.upload(item))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(UploadError::Other(panic_message(panic.as_ref()))))
    };

    let report = match result {
        Ok(()) => {
            let errors_count = ctx.counters.errors();
            let processed_count = ctx.counters.increment_processed();
            report.into_done(processed_count, errors_count)
        }
        Err(e) => {
            let processed_count = ctx.counters.increment_processed();
            let errors_count = ctx.counters.increment_errors();
            report.into_error(processed_count, errors_count, e.to_string())
        }
    };

    let status = report.status_label();
    metrics::ITEMS_TOTAL.with_label_values(&[status]).inc();
    metrics::ITEM_DURATION
        .with_label_values(&[status])
        .observe(started.elapsed().as_secs_f64());
    debug!(item, status, "{}", report.progress());

    ctx.reports.push(report.clone());
    report
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("uploader panicked: {}", detail)
}

/// Worker loop: pulls items until the queue is empty, handing every report to
/// the collector.
pub(crate) async fn run_worker(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    jobs: Arc<JobQueue>,
    completions: mpsc::UnboundedSender<Report>,
) {
    debug!(worker_id, "Worker started");
    while let Some(item) = jobs.next() {
        let report = upload_item(&ctx, &item).await;
        if completions.send(report).is_err() {
            warn!(worker_id, "Collector gone, worker exiting");
            return;
        }
    }
    debug!(worker_id, "Worker finished, no items left");
}
