//! Outbound delivery seam between the coordinator and the transport.

use std::sync::Arc;

use crate::errors::SinkError;

/// A handle through which messages reach one connected participant.
///
/// The transport owns the connection; the coordinator only keeps a weak
/// reference and never closes it. `send` must not block: implementations
/// enqueue and return.
pub trait ParticipantSink: Send + Sync {
    /// Identifier of the underlying connection, unique per connection.
    fn id(&self) -> &str;

    /// Enqueue a serialized message for delivery.
    fn send(&self, message: Arc<String>) -> Result<(), SinkError>;
}
