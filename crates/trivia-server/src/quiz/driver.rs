//! Round driver: decides when questions start and end.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use trivia_core::SessionCoordinator;
use trivia_settings::QuizSettings;

use super::bank::QuestionBank;

/// How often the driver re-checks the participant count while waiting.
const PARTICIPANT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Round pacing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverConfig {
    /// How long each question accepts answers.
    pub round_duration: Duration,
    /// Pause after a round is scored.
    pub intermission: Duration,
    /// Start over after the last question.
    pub repeat: bool,
    /// Connected participants required before the first question.
    pub min_participants: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::from(&QuizSettings::default())
    }
}

impl From<&QuizSettings> for DriverConfig {
    fn from(settings: &QuizSettings) -> Self {
        Self {
            round_duration: Duration::from_secs(settings.round_duration_secs),
            intermission: Duration::from_secs(settings.intermission_secs),
            repeat: settings.repeat,
            min_participants: settings.min_participants,
        }
    }
}

/// Plays a [`QuestionBank`] against a [`SessionCoordinator`].
pub struct RoundDriver {
    coordinator: Arc<SessionCoordinator>,
    bank: QuestionBank,
    config: DriverConfig,
}

impl RoundDriver {
    /// Create a driver.
    pub fn new(
        coordinator: Arc<SessionCoordinator>,
        bank: QuestionBank,
        config: DriverConfig,
    ) -> Self {
        Self {
            coordinator,
            bank,
            config,
        }
    }

    /// Play the bank until it is exhausted (or forever with `repeat`) or
    /// `token` is cancelled. Returns the number of rounds scored.
    ///
    /// A round interrupted by cancellation is still ended, so answers already
    /// submitted are scored and broadcast.
    #[instrument(skip_all, fields(questions = self.bank.len()))]
    pub async fn run(self, token: CancellationToken) -> usize {
        let mut scored = 0;
        if !self.wait_for_participants(&token).await {
            return scored;
        }

        let last = self.bank.len() - 1;
        loop {
            for (i, q) in self.bank.questions().iter().enumerate() {
                self.coordinator.start_round(&q.id, &q.question, &q.answer);
                let cancelled = sleep_or_cancel(self.config.round_duration, &token).await;
                if self.coordinator.end_round().is_some() {
                    scored += 1;
                }
                if cancelled {
                    info!(scored, "round driver cancelled");
                    return scored;
                }
                if i == last && !self.config.repeat {
                    break;
                }
                if sleep_or_cancel(self.config.intermission, &token).await {
                    info!(scored, "round driver cancelled");
                    return scored;
                }
            }
            if !self.config.repeat {
                break;
            }
            debug!("question bank exhausted, repeating");
        }

        info!(scored, "question bank finished");
        scored
    }

    /// Returns `false` if cancelled before enough participants connected.
    async fn wait_for_participants(&self, token: &CancellationToken) -> bool {
        let needed = self.config.min_participants;
        if self.coordinator.participant_count() >= needed {
            return true;
        }
        info!(needed, "waiting for participants");
        let mut poll = tokio::time::interval(PARTICIPANT_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if self.coordinator.participant_count() >= needed {
                        return true;
                    }
                }
                () = token.cancelled() => return false,
            }
        }
    }
}

/// Returns `true` if `token` fired first.
async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => false,
        () = token.cancelled() => true,
    }
}
