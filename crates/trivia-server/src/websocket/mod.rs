//! WebSocket transport: one [`connection::ClientConnection`] per socket,
//! registered with the session coordinator as its participant sink.

pub mod connection;
pub mod session;
