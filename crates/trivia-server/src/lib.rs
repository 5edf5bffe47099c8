//! # trivia-server
//!
//! Network face of a trivia session.
//!
//! - `GET /ws/{player_name}`: one WebSocket per player, registered with the
//!   shared [`trivia_core::SessionCoordinator`] as its participant sink
//! - `GET /health`, `GET /leaderboard`, `GET /metrics`
//! - [`quiz`]: question bank loading and the round driver that paces questions
//! - Graceful shutdown via a shared `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod quiz;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use quiz::{DriverConfig, Question, QuestionBank, QuestionBankError, RoundDriver};
pub use server::{AppState, TriviaServer};
pub use shutdown::ShutdownCoordinator;
