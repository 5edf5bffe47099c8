//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Participants with a registered connection.
    pub participants: usize,
    /// Open WebSocket connections, including ones replaced by a rejoin that
    /// have not closed yet.
    pub connections: usize,
    /// Whether a question is currently accepting answers.
    pub round_active: bool,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    participants: usize,
    connections: usize,
    round_active: bool,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        participants,
        connections,
        round_active,
    }
}
