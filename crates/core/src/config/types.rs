use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Number of workers uploading in parallel.
    #[serde(default = "default_threads_count")]
    pub threads_count: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads_count: default_threads_count(),
        }
    }
}

fn default_threads_count() -> usize {
    4
}

/// Simulated upload configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Emulated time spent uploading one file (milliseconds).
    #[serde(default = "default_worker_time")]
    pub worker_time_ms: u64,
    /// Enables random upload failures.
    #[serde(default)]
    pub error_emulation: bool,
    /// Chance of an emulated failure per file when `error_emulation` is on.
    #[serde(default = "default_failure_probability")]
    pub failure_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            worker_time_ms: default_worker_time(),
            error_emulation: false,
            failure_probability: default_failure_probability(),
        }
    }
}

fn default_worker_time() -> u64 {
    100
}

fn default_failure_probability() -> f64 {
    1.0 / 3.0
}

/// Settings for the demo driver
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DemoConfig {
    /// Number of generated files (`file0`, `file1`, ...).
    #[serde(default = "default_files_count")]
    pub files_count: usize,
    /// How long one poll of the reports queue may block (milliseconds).
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
    /// Chance of a forced stop after each received report.
    #[serde(default = "default_stop_chance")]
    pub stop_chance: f64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            files_count: default_files_count(),
            poll_timeout_ms: default_poll_timeout(),
            stop_chance: default_stop_chance(),
        }
    }
}

fn default_files_count() -> usize {
    20
}

fn default_poll_timeout() -> u64 {
    1000
}

fn default_stop_chance() -> f64 {
    1.0 / 21.0
}
