//! The session coordinator.
//!
//! One [`SessionCoordinator`] is shared (behind an `Arc`) by every connection
//! handler and by the round driver. The participant registry, score table,
//! active round and answer ledger live in a single [`parking_lot::Mutex`], so
//! `join`, `leave`, `submit_answer`, `start_round` and `end_round` are atomic
//! with respect to each other.
//!
//! Broadcasts decide their recipients under the lock and deliver after it is
//! released. A slow or dead sink therefore never stalls other operations, and
//! a failed send is logged and counted but never evicts the sink: cleanup is
//! the transport's job via `leave`.

mod state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::{CoordinatorError, Result};
use crate::metrics::{
    ANSWERS_TOTAL, BROADCAST_FAILURES_TOTAL, MESSAGES_IGNORED_TOTAL, ROUNDS_ENDED_TOTAL,
    ROUNDS_STARTED_TOTAL,
};
use crate::protocol::{InboundMessage, OutboundMessage};
use crate::sink::ParticipantSink;

use state::{Recipient, SessionState, SinkEntry};

/// What happened to an answer submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Recorded for the active round.
    Accepted {
        /// Time since the round started.
        elapsed: Duration,
    },
    /// No round is active.
    NoActiveRound,
    /// The submitter has no registered connection.
    NotRegistered,
    /// The submitter already answered this round; the first answer stands.
    AlreadySubmitted,
}

impl SubmissionOutcome {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::NoActiveRound => "no_active_round",
            Self::NotRegistered => "not_registered",
            Self::AlreadySubmitted => "already_submitted",
        }
    }
}

/// Result of scoring a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    /// The question that was scored.
    pub question_id: String,
    /// The answer submissions were compared against.
    pub correct_answer: String,
    /// Number of recorded submissions.
    pub submissions: usize,
    /// Points earned per submitter (zero for wrong answers).
    pub awards: HashMap<String, u64>,
}

impl RoundSummary {
    /// Number of submitters who earned points.
    pub fn correct_count(&self) -> usize {
        self.awards.values().filter(|p| **p > 0).count()
    }
}

/// Snapshot of the active round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundInfo {
    /// Active question id.
    pub question_id: String,
    /// Question text.
    pub question: String,
    /// Time since the round started.
    pub elapsed: Duration,
    /// Submissions recorded so far.
    pub submissions: usize,
}

/// One row of the ranked score table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    /// Participant name.
    pub name: String,
    /// Cumulative score.
    pub score: u64,
}

/// Shared state of a single trivia session.
#[derive(Default)]
pub struct SessionCoordinator {
    state: Mutex<SessionState>,
}

impl SessionCoordinator {
    /// Create an idle session with no participants.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registry ────────────────────────────────────────────────────────

    /// Register `sink` for `name`, replacing any previous sink. The score is
    /// initialized to zero the first time a name is seen and kept otherwise.
    pub fn join(&self, name: &str, sink: &Arc<dyn ParticipantSink>) {
        let entry = SinkEntry {
            id: sink.id().to_owned(),
            sink: Arc::downgrade(sink),
        };
        let first_seen = self.state.lock().join(name, entry);
        info!(participant = name, sink_id = sink.id(), first_seen, "participant joined");
    }

    /// Remove `name`'s sink. The score entry survives.
    pub fn leave(&self, name: &str) {
        if self.state.lock().leave(name) {
            info!(participant = name, "participant left");
        }
    }

    /// Remove `name`'s sink only if it is still the connection `sink_id`.
    ///
    /// Returns `false` when a newer connection has since joined under the same
    /// name (or the name is not registered), leaving that connection intact.
    pub fn leave_connection(&self, name: &str, sink_id: &str) -> bool {
        let removed = self.state.lock().leave_connection(name, sink_id);
        if removed {
            info!(participant = name, sink_id, "participant left");
        } else {
            debug!(participant = name, sink_id, "stale connection closed, registry unchanged");
        }
        removed
    }

    /// Current cumulative score for `name`.
    pub fn score_of(&self, name: &str) -> Result<u64> {
        self.state
            .lock()
            .score_of(name)
            .ok_or_else(|| CoordinatorError::UnknownParticipant(name.to_owned()))
    }

    /// Snapshot of every score entry, including disconnected participants.
    pub fn scores(&self) -> HashMap<String, u64> {
        self.state.lock().scores()
    }

    /// Scores ranked highest first; ties are ordered by name.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut rows: Vec<(String, u64)> = self.scores().into_iter().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows.into_iter()
            .enumerate()
            .map(|(i, (name, score))| LeaderboardEntry {
                rank: i + 1,
                name,
                score,
            })
            .collect()
    }

    /// Number of participants with a registered sink.
    pub fn participant_count(&self) -> usize {
        self.state.lock().participant_count()
    }

    // ── Broadcaster ─────────────────────────────────────────────────────

    /// Deliver `message` to every registered sink. Returns how many sinks
    /// accepted it.
    pub fn broadcast(&self, message: &OutboundMessage) -> usize {
        let recipients = self.state.lock().recipients();
        fan_out(recipients, message)
    }

    // ── Round lifecycle ─────────────────────────────────────────────────

    /// Open a new round and announce it with `new_question`.
    ///
    /// The ledger is cleared and the start time stamped before the lock is
    /// released, so the broadcast can only reach participants once the round
    /// is ready to accept answers. An active round is replaced and its
    /// submissions are discarded unscored.
    pub fn start_round(&self, question_id: &str, question_text: &str, correct_answer: &str) {
        let (discarded, recipients) = {
            let mut state = self.state.lock();
            let discarded =
                state.start_round(question_id, question_text, correct_answer, Instant::now());
            (discarded, state.recipients())
        };
        if let Some(count) = discarded {
            warn!(question_id, discarded = count, "round replaced before it was scored");
        }
        counter!(ROUNDS_STARTED_TOTAL).increment(1);
        info!(question_id, participants = recipients.len(), "round started");

        let _ = fan_out(
            recipients,
            &OutboundMessage::NewQuestion {
                question: question_text.to_owned(),
            },
        );
    }

    /// Record `name`'s answer for the active round if it is their first.
    pub fn submit_answer(&self, name: &str, answer: &str) -> SubmissionOutcome {
        let outcome = self.state.lock().submit(name, answer, Instant::now());
        counter!(ANSWERS_TOTAL, "outcome" => outcome.label()).increment(1);
        match outcome {
            SubmissionOutcome::Accepted { elapsed } => {
                let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                debug!(participant = name, elapsed_ms, "answer recorded");
            }
            other => {
                debug!(participant = name, reason = other.label(), "answer ignored");
            }
        }
        outcome
    }

    /// Score the active round, broadcast the full score table, and go idle.
    ///
    /// Returns `None` (and broadcasts nothing) when no round is active.
    pub fn end_round(&self) -> Option<RoundSummary> {
        let (summary, scores, recipients) = {
            let mut state = self.state.lock();
            let summary = state.end_round()?;
            (summary, state.scores(), state.recipients())
        };
        counter!(ROUNDS_ENDED_TOTAL).increment(1);
        info!(
            question_id = summary.question_id.as_str(),
            submissions = summary.submissions,
            correct = summary.correct_count(),
            "round ended"
        );

        let _ = fan_out(recipients, &OutboundMessage::Scores { scores });
        Some(summary)
    }

    /// Snapshot of the active round, if any.
    pub fn active_round(&self) -> Option<RoundInfo> {
        self.state.lock().active_round(Instant::now())
    }

    // ── Message handling ────────────────────────────────────────────────

    /// Decode a raw inbound frame from `name` and act on it.
    ///
    /// Frames that are not valid messages are ignored.
    pub fn handle_message(&self, name: &str, sink: &dyn ParticipantSink, raw: &str) {
        match InboundMessage::decode(raw) {
            Ok(message) => self.handle_inbound(name, sink, message),
            Err(e) => {
                counter!(MESSAGES_IGNORED_TOTAL, "reason" => "malformed").increment(1);
                debug!(participant = name, error = %e, "ignoring malformed message");
            }
        }
    }

    /// Act on a decoded inbound message from `name`.
    ///
    /// `get_score` replies to `sink` only.
    pub fn handle_inbound(&self, name: &str, sink: &dyn ParticipantSink, message: InboundMessage) {
        match message {
            InboundMessage::SubmitAnswer { answer } => {
                let _ = self.submit_answer(name, &answer);
            }
            InboundMessage::GetScore => match self.score_of(name) {
                Ok(score) => {
                    let _ = send_to(name, sink, &OutboundMessage::Score { score });
                }
                Err(e) => debug!(participant = name, error = %e, "score requested before join"),
            },
            InboundMessage::Unknown => {
                counter!(MESSAGES_IGNORED_TOTAL, "reason" => "unknown_type").increment(1);
                debug!(participant = name, "ignoring unknown message type");
            }
        }
    }
}

fn serialize(message: &OutboundMessage) -> Option<Arc<String>> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(kind = message.kind(), error = %e, "failed to serialize message");
            None
        }
    }
}

/// Send to each recipient outside the lock; failures are isolated.
fn fan_out(recipients: Vec<Recipient>, message: &OutboundMessage) -> usize {
    let Some(payload) = serialize(message) else {
        return 0;
    };
    let total = recipients.len();
    let mut delivered = 0;
    for Recipient { name, entry } in recipients {
        let Some(sink) = entry.sink.upgrade() else {
            counter!(BROADCAST_FAILURES_TOTAL).increment(1);
            warn!(
                participant = name.as_str(),
                sink_id = entry.id.as_str(),
                kind = message.kind(),
                "sink already dropped"
            );
            continue;
        };
        match sink.send(Arc::clone(&payload)) {
            Ok(()) => delivered += 1,
            Err(e) => {
                counter!(BROADCAST_FAILURES_TOTAL).increment(1);
                warn!(
                    participant = name.as_str(),
                    sink_id = entry.id.as_str(),
                    kind = message.kind(),
                    error = %e,
                    "failed to deliver broadcast"
                );
            }
        }
    }
    debug!(kind = message.kind(), recipients = total, delivered, "broadcast");
    delivered
}

fn send_to(name: &str, sink: &dyn ParticipantSink, message: &OutboundMessage) -> bool {
    let Some(payload) = serialize(message) else {
        return false;
    };
    match sink.send(payload) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                participant = name,
                sink_id = sink.id(),
                kind = message.kind(),
                error = %e,
                "failed to deliver reply"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests;
