//! `TriviaServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use trivia_core::{LeaderboardEntry, SessionCoordinator};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The trivia session every connection joins.
    pub coordinator: Arc<SessionCoordinator>,
    /// Connection limits and heartbeat timing.
    pub config: Arc<ServerConfig>,
    /// Open WebSocket connections.
    pub connections: Arc<AtomicUsize>,
    /// Cancelled on server shutdown; sessions derive child tokens from it.
    pub shutdown: CancellationToken,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus renderer, if a recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

/// Body of `GET /leaderboard`.
#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    /// Ranked scores, highest first.
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// The trivia server.
pub struct TriviaServer {
    config: Arc<ServerConfig>,
    coordinator: Arc<SessionCoordinator>,
    shutdown: Arc<ShutdownCoordinator>,
    connections: Arc<AtomicUsize>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl TriviaServer {
    /// Create a server in front of `coordinator`.
    ///
    /// Limits a session cannot run with are raised via
    /// [`ServerConfig::clamped`].
    pub fn new(config: ServerConfig, coordinator: Arc<SessionCoordinator>) -> Self {
        Self {
            config: Arc::new(config.clamped()),
            coordinator,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            connections: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            coordinator: self.coordinator.clone(),
            config: self.config.clone(),
            connections: self.connections.clone(),
            shutdown: self.shutdown.token(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws/{player_name}", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/leaderboard", get(leaderboard_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "trivia server listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        });
        Ok((local_addr, handle))
    }

    /// The shared session coordinator.
    pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
        &self.coordinator
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open WebSocket connections.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}

/// GET /ws/{player_name}
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(player_name): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let player_name = player_name.trim().to_owned();
    if player_name.is_empty() {
        return (StatusCode::BAD_REQUEST, "player name must not be blank").into_response();
    }
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, player_name, state))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.coordinator.participant_count(),
        state.connections.load(Ordering::Relaxed),
        state.coordinator.active_round().is_some(),
    ))
}

/// GET /leaderboard
async fn leaderboard_handler(State(state): State<AppState>) -> Json<LeaderboardResponse> {
    Json(LeaderboardResponse {
        leaderboard: state.coordinator.leaderboard(),
    })
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
