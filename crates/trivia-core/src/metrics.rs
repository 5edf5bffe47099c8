//! Names of the metrics the coordinator records.
//!
//! Recorded through the `metrics` facade; the server crate installs the
//! Prometheus recorder that renders them.

/// Rounds started (counter).
pub const ROUNDS_STARTED_TOTAL: &str = "trivia_rounds_started_total";
/// Rounds scored (counter).
pub const ROUNDS_ENDED_TOTAL: &str = "trivia_rounds_ended_total";
/// Answer submissions (counter, labels: outcome).
pub const ANSWERS_TOTAL: &str = "trivia_answers_total";
/// Inbound frames ignored (counter, labels: reason).
pub const MESSAGES_IGNORED_TOTAL: &str = "trivia_messages_ignored_total";
/// Broadcast deliveries that failed (counter).
pub const BROADCAST_FAILURES_TOTAL: &str = "trivia_broadcast_failures_total";
