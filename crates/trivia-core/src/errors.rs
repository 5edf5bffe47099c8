//! Error types for the session coordinator and its collaborators.
//!
//! Only [`CoordinatorError::UnknownParticipant`] is ever returned from a
//! coordinator operation. The other types describe failures the coordinator
//! absorbs: a sink refusing a message, or an inbound frame that does not
//! decode.

use thiserror::Error;

/// Errors returned by coordinator queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// The name has never joined the session.
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),
}

/// Why a message could not be handed to a participant's sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The connection behind the sink is gone.
    #[error("sink closed")]
    Closed,
    /// The outbound queue is at capacity.
    #[error("sink queue full")]
    Full,
}

/// Failure to decode an inbound frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON or does not match a known message shape.
    #[error("invalid message: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;
