//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use trivia_settings::ServerSettings;

/// Configuration for the trivia server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Outbound queue size per connection.
    pub send_queue_capacity: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl ServerConfig {
    /// Interval between server Ping frames.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Silence after which a client is considered gone.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Raise values a session cannot run with to their smallest usable
    /// setting: at least one queued message, a heartbeat of at least one
    /// second, and a timeout no shorter than the heartbeat.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        if self.send_queue_capacity == 0 {
            warn!("send_queue_capacity is 0, using 1");
            self.send_queue_capacity = 1;
        }
        if self.heartbeat_interval_secs == 0 {
            warn!("heartbeat_interval_secs is 0, using 1");
            self.heartbeat_interval_secs = 1;
        }
        if self.heartbeat_timeout_secs < self.heartbeat_interval_secs {
            warn!(
                timeout = self.heartbeat_timeout_secs,
                interval = self.heartbeat_interval_secs,
                "heartbeat timeout shorter than interval, raising it"
            );
            self.heartbeat_timeout_secs = self.heartbeat_interval_secs;
        }
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            send_queue_capacity: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            send_queue_capacity: settings.send_queue_capacity,
            heartbeat_interval_secs: settings.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.heartbeat_timeout_secs,
            max_message_size: settings.max_message_size,
        }
    }
}
