mod metrics;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uploader_core::{
    create_reports_queue, load_config, load_config_from_env, validate_config, Config,
    SimulatedUploader, UploadOrchestrator,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load(config_path())?;
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        files = config.demo.files_count,
        threads = config.pool.threads_count,
        worker_time_ms = config.simulation.worker_time_ms,
        error_emulation = config.simulation.error_emulation,
        "Configuration loaded successfully"
    );

    let registry = metrics::registry()?;

    let files: Vec<String> = (0..config.demo.files_count)
        .map(|i| format!("file{}", i))
        .collect();

    let (reports, mut receiver) = create_reports_queue();
    let uploader = SimulatedUploader::from_config(&config.simulation);
    let orchestrator = UploadOrchestrator::new(
        files,
        config.pool.threads_count,
        reports,
        Arc::new(uploader),
    )
    .context("Failed to create upload orchestrator")?;

    orchestrator
        .start()
        .await
        .context("Failed to start upload batch")?;
    info!(run_id = %orchestrator.run_id(), "Upload batch running");

    let poll_timeout = Duration::from_millis(config.demo.poll_timeout_ms);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    // Watch progress in real time
    while orchestrator.is_active() {
        tokio::select! {
            report = receiver.recv_timeout(poll_timeout) => {
                let Some(report) = report else {
                    continue;
                };
                // Randomly emulate a forced stop
                if rand::rng().random_bool(config.demo.stop_chance) {
                    info!("Emulating a forced stop");
                    if let Err(e) = orchestrator.stop().await {
                        warn!("Stop ignored: {}", e);
                    }
                }
                println!("{}", report);
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                info!("Interrupted, stopping upload batch");
                if let Err(e) = orchestrator.stop().await {
                    warn!("Stop ignored: {}", e);
                }
            }
        }
    }

    // Print whatever is left in the queue
    for report in receiver.drain() {
        println!("{}", report);
    }

    let result = orchestrator
        .result()
        .context("Upload batch ended without a result")?;
    println!("{}", result);

    let status = orchestrator.status().await;
    if !status.state.is_terminal() {
        warn!(state = ?status.state, "Upload batch still settling");
    }
    debug!(
        "Final status: {}",
        serde_json::to_string(&status).context("Failed to serialize status")?
    );
    debug!("Metrics:\n{}", metrics::encode_metrics(&registry)?);

    Ok(())
}

/// Config path from `UPLOADER_CONFIG`, defaulting to `uploader.toml`.
fn config_path() -> PathBuf {
    std::env::var("UPLOADER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("uploader.toml"))
}

fn load(path: PathBuf) -> Result<Config> {
    if path.exists() {
        info!("Loading configuration from {:?}", path);
        load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
    } else {
        info!("No config file at {:?}, using defaults", path);
        load_config_from_env().context("Failed to load config from environment")
    }
}
