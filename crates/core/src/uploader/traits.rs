//! Trait definitions for the uploader module.

use async_trait::async_trait;

use super::error::UploadError;

/// The per-item unit of work executed by pool workers.
///
/// Implementations are opaque to the pool: latency and failure distribution
/// are theirs to decide. A failure is reported as data and never stops the
/// batch.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Returns the name of this uploader implementation.
    fn name(&self) -> &str;

    /// Uploads a single item.
    async fn upload(&self, item: &str) -> Result<(), UploadError>;
}
