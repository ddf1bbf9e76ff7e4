//! Testing utilities and mock implementations.
//!
//! This module provides a controllable [`MockUploader`] plus fixtures, so the
//! pool can be exercised without any real transfer.
//!
//! # Example
//!
//! ```rust,ignore
//! use uploader_core::testing::{fixtures, MockUploader};
//!
//! let uploader = MockUploader::new();
//! uploader.fail_item("file3", "quota exceeded").await;
//!
//! let files = fixtures::files(10);
//! ```

mod mock_uploader;

pub use mock_uploader::{MockUploader, RecordedUpload};

/// Test fixtures and helper functions.
pub mod fixtures {
    /// Item names `file0` through `file{n-1}`.
    pub fn files(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("file{}", i)).collect()
    }
}
