//! Bounded worker pool that uploads a fixed batch of items.
//!
//! The pool drives one batch through its lifecycle:
//! - **Dispatch**: `threads_count` workers pull items from a shared FIFO
//! - **Reporting**: every finished item yields a report on the reports queue
//! - **Collection**: a single collector owns the results and detects completion
//!
//! A batch ends either naturally (every item reported) or through `stop()`,
//! which cancels in-flight uploads and reports the rest as aborted.
//!
//! # Example
//!
//! ```ignore
//! use uploader_core::pool::UploadOrchestrator;
//! use uploader_core::report::create_reports_queue;
//! use uploader_core::uploader::SimulatedUploader;
//!
//! let (reports, mut receiver) = create_reports_queue();
//! let uploader = SimulatedUploader::new(Duration::from_millis(100));
//! let orchestrator = UploadOrchestrator::new(files, 4, reports, Arc::new(uploader))?;
//!
//! orchestrator.start().await?;
//! orchestrator.join().await?;
//! println!("{}", orchestrator.result().unwrap_or_default());
//! ```

mod collector;
mod counters;
mod runner;
mod types;
mod worker;

pub use counters::{SharedCounters, StartSignal};
pub use runner::UploadOrchestrator;
pub use types::{PoolState, PoolStatus, UploaderError};
