//! Mock uploader for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::uploader::{UploadError, Uploader};

/// A recorded upload call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    /// The item that was submitted.
    pub item: String,
    /// When the call was made.
    pub timestamp: DateTime<Utc>,
}

/// Tracks how many uploads are running at once.
struct InFlight<'a> {
    current: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock implementation of the Uploader trait.
///
/// Provides controllable behavior for testing:
/// - Track upload calls for assertions
/// - Fail or panic on chosen items
/// - Park every upload past a completion limit, so a batch can be caught
///   mid-flight and stopped
///
/// Clones share state, so a test can keep one handle while the orchestrator
/// owns another.
///
/// # Example
///
/// ```rust,ignore
/// use uploader_core::testing::MockUploader;
///
/// let uploader = MockUploader::new();
/// uploader.fail_item("file2", "quota exceeded").await;
/// uploader.set_completion_limit(3).await;
///
/// // Only the first three uploads return; the rest hang until stopped.
/// let orchestrator = UploadOrchestrator::new(files, 2, reports, Arc::new(uploader.clone()))?;
/// ```
#[derive(Debug, Clone)]
pub struct MockUploader {
    /// Recorded upload calls.
    uploads: Arc<RwLock<Vec<RecordedUpload>>>,
    /// Items that fail, with their error message.
    failures: Arc<RwLock<HashMap<String, String>>>,
    /// Items whose upload panics.
    panics: Arc<RwLock<HashSet<String>>>,
    /// Simulated upload duration in milliseconds.
    duration_ms: Arc<RwLock<u64>>,
    /// Uploads past this many never return.
    completion_limit: Arc<RwLock<Option<usize>>>,
    admitted: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUploader {
    /// Create a new mock uploader.
    pub fn new() -> Self {
        Self {
            uploads: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            panics: Arc::new(RwLock::new(HashSet::new())),
            duration_ms: Arc::new(RwLock::new(5)),
            completion_limit: Arc::new(RwLock::new(None)),
            admitted: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all recorded upload calls.
    pub async fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    /// Get the number of upload calls made.
    pub async fn call_count(&self) -> usize {
        self.uploads.read().await.len()
    }

    /// Highest number of uploads observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Set the simulated upload duration.
    pub async fn set_duration(&self, duration: Duration) {
        *self.duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Make the upload of `item` fail with `message`.
    pub async fn fail_item(&self, item: &str, message: &str) {
        self.failures
            .write()
            .await
            .insert(item.to_string(), message.to_string());
    }

    /// Make the upload of `item` panic.
    pub async fn panic_on_item(&self, item: &str) {
        self.panics.write().await.insert(item.to_string());
    }

    /// Let only the first `limit` uploads return.
    pub async fn set_completion_limit(&self, limit: usize) {
        *self.completion_limit.write().await = Some(limit);
    }
}

#[async_trait]
impl Uploader for MockUploader {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(&self, item: &str) -> Result<(), UploadError> {
        self.uploads.write().await.push(RecordedUpload {
            item: item.to_string(),
            timestamp: Utc::now(),
        });
        let _in_flight = InFlight::enter(&self.in_flight, &self.max_in_flight);

        let limit = *self.completion_limit.read().await;
        if let Some(limit) = limit {
            if self.admitted.fetch_add(1, Ordering::SeqCst) >= limit {
                std::future::pending::<()>().await;
            }
        }

        let duration_ms = *self.duration_ms.read().await;
        if duration_ms > 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }

        if self.panics.read().await.contains(item) {
            panic!("mock upload of {} panicked", item);
        }

        if let Some(message) = self.failures.read().await.get(item) {
            return Err(UploadError::Other(message.clone()));
        }

        Ok(())
    }
}
