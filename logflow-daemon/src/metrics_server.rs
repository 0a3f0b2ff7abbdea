//! Prometheus exporter for stage metrics.
//!
//! Uses the HTTP listener built into `metrics-exporter-prometheus`; once
//! installed, every `metrics::counter!` and friends in the pipeline records
//! into it.

use std::net::SocketAddr;

use anyhow::Result;
use logflow_core::config::MetricsConfig;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

/// Installs the global recorder and starts the scrape listener.
///
/// Call at most once per process.
///
/// # Errors
///
/// - the endpoint is not `/metrics`
/// - the listen address does not parse
/// - a recorder is already installed or the socket cannot be bound
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is served",
            config.endpoint
        ));
    }

    let addr = listen_addr(config)?;
    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(logflow_core::metrics::STAGE_CYCLE_DURATION_SECONDS.to_owned()),
            &logflow_core::metrics::CYCLE_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {}", e))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    logflow_core::metrics::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}

/// Socket address the exporter listens on.
pub fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}
