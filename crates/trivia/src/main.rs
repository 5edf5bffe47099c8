//! # trivia
//!
//! Trivia server binary: loads settings, wires the session coordinator to the
//! HTTP/WebSocket server, and runs the round driver until Ctrl-C.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use trivia_core::SessionCoordinator;
use trivia_core::logging::init_subscriber;
use trivia_server::metrics::install_recorder;
use trivia_server::{DriverConfig, QuestionBank, RoundDriver, ServerConfig, TriviaServer};
use trivia_settings::TriviaSettings;

/// Live trivia server.
#[derive(Parser, Debug)]
#[command(name = "trivia", about = "Live multi-player trivia server")]
struct Cli {
    /// Settings file (defaults to `~/.trivia/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// JSON question bank (overrides settings).
    #[arg(long)]
    questions: Option<PathBuf>,

    /// Seconds each question accepts answers.
    #[arg(long)]
    round_secs: Option<u64>,

    /// Seconds between a round's scores and the next question.
    #[arg(long)]
    intermission_secs: Option<u64>,

    /// Participants required before the first question.
    #[arg(long)]
    min_participants: Option<usize>,

    /// Loop the question bank forever.
    #[arg(long)]
    repeat: bool,

    /// Serve connections without running rounds.
    #[arg(long)]
    no_driver: bool,
}

impl Cli {
    /// Layer command-line flags over loaded settings.
    fn apply(&self, settings: &mut TriviaSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(path) = &self.questions {
            settings.quiz.question_bank_path = Some(path.to_string_lossy().into_owned());
        }
        if let Some(secs) = self.round_secs {
            settings.quiz.round_duration_secs = secs;
        }
        if let Some(secs) = self.intermission_secs {
            settings.quiz.intermission_secs = secs;
        }
        if let Some(n) = self.min_participants {
            settings.quiz.min_participants = n;
        }
        if self.repeat {
            settings.quiz.repeat = true;
        }
        if self.no_driver {
            settings.quiz.auto_start = false;
        }
    }
}

fn resolve_settings(args: &Cli) -> Result<TriviaSettings> {
    let path = args
        .settings
        .clone()
        .unwrap_or_else(trivia_settings::settings_path);
    let mut settings = trivia_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    args.apply(&mut settings);
    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = resolve_settings(&args)?;

    init_subscriber(settings.logging.level.as_filter_str());
    let metrics = install_recorder().context("Failed to install metrics recorder")?;

    let bank_path = settings.quiz.question_bank_path.as_deref().map(Path::new);
    let bank = QuestionBank::load_or_sample(bank_path).context("Failed to load question bank")?;

    let coordinator = Arc::new(SessionCoordinator::new());
    let server = TriviaServer::new(ServerConfig::from(&settings.server), coordinator.clone())
        .with_metrics(metrics);

    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;
    server.shutdown().track("http", handle);

    tracing::info!("Trivia server listening on http://{addr} ({} questions)", bank.len());

    if settings.quiz.auto_start {
        let driver = RoundDriver::new(coordinator, bank, DriverConfig::from(&settings.quiz));
        let token = server.shutdown().token();
        server.shutdown().track(
            "round-driver",
            tokio::spawn(async move {
                let _ = driver.run(token).await;
            }),
        );
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if !server.shutdown().graceful_shutdown(None).await {
        tracing::warn!("Some tasks were aborted during shutdown");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
