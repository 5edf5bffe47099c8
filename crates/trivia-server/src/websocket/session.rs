//! WebSocket session lifecycle: a single player from upgrade through
//! disconnect.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use trivia_core::ParticipantSink;

use super::connection::ClientConnection;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::server::AppState;

/// How long the writer gets to flush and send a Close frame after the
/// reader stops.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Run a WebSocket session for `player_name`.
///
/// 1. Registers a fresh [`ClientConnection`] with the coordinator
/// 2. Passes inbound text frames to the coordinator's message handler
/// 3. Forwards the outbound queue to the socket and pings periodically
/// 4. Leaves the session when the client closes, stops answering pings, or
///    the server shuts down
#[instrument(skip_all, fields(player = %player_name))]
pub async fn run_ws_session(ws: WebSocket, player_name: String, state: AppState) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(state.config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(player_name.clone(), send_tx));
    let sink: Arc<dyn ParticipantSink> = connection.clone();

    info!(connection_id = connection.id.as_str(), "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    state.coordinator.join(&player_name, &sink);
    let _ = state.connections.fetch_add(1, Ordering::Relaxed);

    // Cancelled by server shutdown, by the writer on a dead socket, or by the
    // reader on close.
    let session_token = state.shutdown.child_token();

    let heartbeat_interval = state.config.heartbeat_interval();
    let heartbeat_timeout = state.config.heartbeat_timeout();
    let outbound_conn = connection.clone();
    let outbound_token = session_token.clone();
    let outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat_interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(String::clone(&text).into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > heartbeat_timeout
                    {
                        warn!("client unresponsive for {heartbeat_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_token.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        outbound_token.cancel();
    });

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            () = session_token.cancelled() => break,
        };
        let msg = match frame {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(error = %e, "websocket read error");
                break;
            }
            None => break,
        };

        connection.mark_alive();
        match msg {
            Message::Text(text) => {
                state
                    .coordinator
                    .handle_message(&player_name, &*connection, text.as_str());
            }
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => state.coordinator.handle_message(&player_name, &*connection, text),
                Err(_) => debug!(len = data.len(), "ignoring non-UTF8 binary frame"),
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    let _ = state.coordinator.leave_connection(&player_name, &connection.id);

    session_token.cancel();
    let abort = outbound.abort_handle();
    if tokio::time::timeout(CLOSE_GRACE, outbound).await.is_err() {
        abort.abort();
    }

    info!(
        connection_id = connection.id.as_str(),
        dropped = connection.drop_count(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
    let _ = state.connections.fetch_sub(1, Ordering::Relaxed);
}
