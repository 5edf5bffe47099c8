//! # trivia-core
//!
//! Foundation of a live, multi-participant trivia session.
//!
//! - [`coordinator::SessionCoordinator`]: the shared session state (participant
//!   registry, active round, answer ledger) behind one lock, plus fan-out to
//!   every connected participant
//! - [`protocol`]: inbound/outbound JSON message shapes
//! - [`scoring`]: answer matching and the speed-bonus formula
//! - [`sink::ParticipantSink`]: the seam between the coordinator and whatever
//!   transport delivers messages
//! - [`metrics`]: names of the counters the coordinator records
//! - [`logging`]: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod coordinator;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod scoring;
pub mod sink;

pub use coordinator::{
    LeaderboardEntry, RoundInfo, RoundSummary, SessionCoordinator, SubmissionOutcome,
};
pub use errors::{CoordinatorError, ProtocolError, Result, SinkError};
pub use protocol::{InboundMessage, OutboundMessage};
pub use sink::ParticipantSink;
