//! Sleep-based placeholder for a real upload.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::config::SimulationConfig;

use super::error::UploadError;
use super::traits::Uploader;

/// Uploader that emulates transfer latency and, optionally, random failures.
#[derive(Debug, Clone)]
pub struct SimulatedUploader {
    worker_time: Duration,
    error_emulation: bool,
    failure_probability: f64,
}

impl SimulatedUploader {
    /// Creates an uploader that takes `worker_time` per item and never fails.
    pub fn new(worker_time: Duration) -> Self {
        Self {
            worker_time,
            error_emulation: false,
            failure_probability: SimulationConfig::default().failure_probability,
        }
    }

    /// Builds an uploader from the `[simulation]` config section.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            worker_time: Duration::from_millis(config.worker_time_ms),
            error_emulation: config.error_emulation,
            failure_probability: config.failure_probability,
        }
    }

    /// Enables or disables random failure injection.
    pub fn with_error_emulation(mut self, enabled: bool) -> Self {
        self.error_emulation = enabled;
        self
    }

    /// Sets the probability of an injected failure, clamped to `0.0..=1.0`.
    pub fn with_failure_probability(mut self, probability: f64) -> Self {
        self.failure_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn worker_time(&self) -> Duration {
        self.worker_time
    }

    pub fn error_emulation(&self) -> bool {
        self.error_emulation
    }

    fn roll_failure(&self) -> bool {
        self.error_emulation && rand::rng().random_bool(self.failure_probability.clamp(0.0, 1.0))
    }
}

#[async_trait]
impl Uploader for SimulatedUploader {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn upload(&self, _item: &str) -> Result<(), UploadError> {
        if !self.worker_time.is_zero() {
            tokio::time::sleep(self.worker_time).await;
        }

        if self.roll_failure() {
            return Err(UploadError::Emulated);
        }

        Ok(())
    }
}
