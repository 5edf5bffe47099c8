//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use trivia_core::{ParticipantSink, SinkError};

use crate::metrics::WS_SEND_DROPS_TOTAL;

/// A connected player. The coordinator holds it as a weak
/// [`ParticipantSink`]; the session task owns the strong reference.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Name the player joined under.
    pub player_name: String,
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection with a fresh time-ordered id.
    pub fn new(player_name: String, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self::with_id(format!("conn_{}", uuid::Uuid::now_v7()), player_name, tx)
    }

    /// Create a connection with an explicit id.
    pub fn with_id(id: String, player_name: String, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            player_name,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong or any inbound frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl ParticipantSink for ClientConnection {
    fn id(&self) -> &str {
        &self.id
    }

    /// Enqueue without waiting. A full or closed queue counts as a drop.
    fn send(&self, message: Arc<String>) -> Result<(), SinkError> {
        self.tx.try_send(message).map_err(|e| {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            counter!(WS_SEND_DROPS_TOTAL).increment(1);
            match e {
                mpsc::error::TrySendError::Full(_) => SinkError::Full,
                mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
            }
        })
    }
}
