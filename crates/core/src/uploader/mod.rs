//! The opaque upload operation consumed by pool workers.
//!
//! The pool only knows the [`Uploader`] trait. [`SimulatedUploader`] stands in
//! for a real transfer: it sleeps for a configurable time and can fail at
//! random.

mod error;
mod simulated;
mod traits;

pub use error::UploadError;
pub use simulated::SimulatedUploader;
pub use traits::Uploader;
