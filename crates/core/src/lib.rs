pub mod config;
pub mod metrics;
pub mod pool;
pub mod report;
pub mod summary;
pub mod testing;
pub mod uploader;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
    DemoConfig, PoolConfig, SimulationConfig,
};
pub use pool::{PoolState, PoolStatus, UploadOrchestrator, UploaderError};
pub use report::{create_reports_queue, Report, ReportStatus, ReportsHandle, ReportsReceiver};
pub use summary::{BatchOutcome, ResultBuckets};
pub use uploader::{SimulatedUploader, UploadError, Uploader};
