//! Lock-protected session state: registry, scores, active round and its
//! answer ledger.
//!
//! Everything here is plain data with synchronous transitions. The
//! coordinator wraps one [`SessionState`] in a single mutex, so each method
//! runs atomically with respect to every other.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Weak;
use std::time::Duration;

use tokio::time::Instant;

use super::{RoundInfo, RoundSummary, SubmissionOutcome};
use crate::scoring;
use crate::sink::ParticipantSink;

/// A registered connection for one participant.
#[derive(Clone)]
pub(crate) struct SinkEntry {
    pub(crate) id: String,
    pub(crate) sink: Weak<dyn ParticipantSink>,
}

/// Snapshot of one delivery target, taken under the lock.
pub(crate) struct Recipient {
    pub(crate) name: String,
    pub(crate) entry: SinkEntry,
}

struct Submission {
    answer: String,
    elapsed: Duration,
}

struct ActiveRound {
    question_id: String,
    question_text: String,
    correct_answer: String,
    started_at: Instant,
    submissions: HashMap<String, Submission>,
}

#[derive(Default)]
pub(crate) struct SessionState {
    sinks: HashMap<String, SinkEntry>,
    scores: HashMap<String, u64>,
    round: Option<ActiveRound>,
}

impl SessionState {
    /// Register or replace the sink for `name`. Returns `true` the first time
    /// a name is ever seen.
    pub(crate) fn join(&mut self, name: &str, entry: SinkEntry) -> bool {
        let _ = self.sinks.insert(name.to_owned(), entry);
        match self.scores.entry(name.to_owned()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let _ = slot.insert(0);
                true
            }
        }
    }

    pub(crate) fn leave(&mut self, name: &str) -> bool {
        self.sinks.remove(name).is_some()
    }

    /// Remove the sink only if it is still the connection identified by
    /// `sink_id`.
    pub(crate) fn leave_connection(&mut self, name: &str, sink_id: &str) -> bool {
        let is_current = self.sinks.get(name).is_some_and(|e| e.id == sink_id);
        if is_current {
            let _ = self.sinks.remove(name);
        }
        is_current
    }

    pub(crate) fn score_of(&self, name: &str) -> Option<u64> {
        self.scores.get(name).copied()
    }

    pub(crate) fn scores(&self) -> HashMap<String, u64> {
        self.scores.clone()
    }

    pub(crate) fn participant_count(&self) -> usize {
        self.sinks.len()
    }

    pub(crate) fn recipients(&self) -> Vec<Recipient> {
        self.sinks
            .iter()
            .map(|(name, entry)| Recipient {
                name: name.clone(),
                entry: entry.clone(),
            })
            .collect()
    }

    /// Begin a new round, replacing any active one. Returns the number of
    /// unscored submissions discarded from the replaced round.
    pub(crate) fn start_round(
        &mut self,
        question_id: &str,
        question_text: &str,
        correct_answer: &str,
        now: Instant,
    ) -> Option<usize> {
        let replaced = self.round.replace(ActiveRound {
            question_id: question_id.to_owned(),
            question_text: question_text.to_owned(),
            correct_answer: correct_answer.to_owned(),
            started_at: now,
            submissions: HashMap::new(),
        });
        replaced.map(|r| r.submissions.len())
    }

    pub(crate) fn submit(&mut self, name: &str, answer: &str, now: Instant) -> SubmissionOutcome {
        let Some(round) = self.round.as_mut() else {
            return SubmissionOutcome::NoActiveRound;
        };
        if !self.sinks.contains_key(name) {
            return SubmissionOutcome::NotRegistered;
        }
        match round.submissions.entry(name.to_owned()) {
            Entry::Occupied(_) => SubmissionOutcome::AlreadySubmitted,
            Entry::Vacant(slot) => {
                let elapsed = now.saturating_duration_since(round.started_at);
                let _ = slot.insert(Submission {
                    answer: answer.to_owned(),
                    elapsed,
                });
                SubmissionOutcome::Accepted { elapsed }
            }
        }
    }

    /// Score the active round and return to idle.
    pub(crate) fn end_round(&mut self) -> Option<RoundSummary> {
        let round = self.round.take()?;
        let mut awards = HashMap::with_capacity(round.submissions.len());
        for (name, submission) in &round.submissions {
            let points =
                scoring::points_for(&submission.answer, &round.correct_answer, submission.elapsed);
            if points > 0 {
                *self.scores.entry(name.clone()).or_insert(0) += points;
            }
            let _ = awards.insert(name.clone(), points);
        }
        Some(RoundSummary {
            question_id: round.question_id,
            correct_answer: round.correct_answer,
            submissions: round.submissions.len(),
            awards,
        })
    }

    pub(crate) fn active_round(&self, now: Instant) -> Option<RoundInfo> {
        self.round.as_ref().map(|r| RoundInfo {
            question_id: r.question_id.clone(),
            question: r.question_text.clone(),
            elapsed: now.saturating_duration_since(r.started_at),
            submissions: r.submissions.len(),
        })
    }
}
