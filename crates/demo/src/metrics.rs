//! Prometheus exposition for the demo run.

use anyhow::{Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};

/// Build a registry holding every upload pool metric.
pub fn registry() -> Result<Registry> {
    let registry = Registry::new();
    for metric in uploader_core::metrics::all_metrics() {
        registry
            .register(metric)
            .context("Failed to register metric")?;
    }
    Ok(registry)
}

/// Encode all metrics in the Prometheus text format.
pub fn encode_metrics(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}
