//! Prometheus metrics recorder and metric names.
//!
//! The coordinator in `trivia-core` records round, answer and broadcast
//! metrics through the `metrics` facade; this crate records connection
//! metrics. Whatever recorder is installed collects both, and the core names
//! are re-exported here.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

pub use trivia_core::metrics::{
    ANSWERS_TOTAL, BROADCAST_FAILURES_TOTAL, MESSAGES_IGNORED_TOTAL, ROUNDS_ENDED_TOTAL,
    ROUNDS_STARTED_TOTAL,
};

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Fails if a global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket connection lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Messages dropped because a connection's outbound queue was full or
/// closed (counter).
pub const WS_SEND_DROPS_TOTAL: &str = "ws_send_drops_total";
