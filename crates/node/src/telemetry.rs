// Path: crates/node/src/telemetry.rs

use anyhow::anyhow;
use mnq_types::config::TelemetryConfig;

/// Installs the global subscriber and publishes the Prometheus sink to every metrics consumer.
///
/// Call once per process, before [`QuorumNode::build`](crate::QuorumNode::build).
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    mnq_telemetry::init::init_tracing(&config.log_filter)?;
    let sink = mnq_telemetry::prometheus::install()?;
    mnq_telemetry::sinks::SINK
        .set(sink)
        .map_err(|_| anyhow!("metrics sink already installed"))?;
    mnq_storage::metrics::SINK
        .set(sink)
        .map_err(|_| anyhow!("storage metrics sink already installed"))?;
    tracing::info!(
        target: "node",
        event = "telemetry_ready",
        metrics_addr = ?config.metrics_addr
    );
    Ok(())
}
