//! Prometheus counters for the produce and consume paths.
//!
//! Counters are always recorded; they are only exported when a listener
//! address is configured.

use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use thiserror::Error;

/// Records acknowledged by the broker, labelled by `event_type`.
pub const PUBLISHED_TOTAL: &str = "transactions_published_total";

/// Records the broker rejected or that never left the client, labelled by `event_type`.
pub const PUBLISH_ERRORS_TOTAL: &str = "transactions_publish_errors_total";

/// Records printed by the logger.
pub const CONSUMED_TOTAL: &str = "transactions_consumed_total";

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Register descriptions for every counter.
pub fn register_metrics() {
    describe_counter!(PUBLISHED_TOTAL, "Total transaction events acknowledged by the broker");
    describe_counter!(
        PUBLISH_ERRORS_TOTAL,
        "Total transaction events that failed to publish"
    );
    describe_counter!(CONSUMED_TOTAL, "Total transaction records printed by the logger");
}

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a recorder is already installed or the
/// listener cannot bind.
pub fn install_exporter(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    register_metrics();
    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}
