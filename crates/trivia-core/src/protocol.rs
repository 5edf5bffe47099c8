//! JSON wire protocol between participants and the coordinator.
//!
//! Every message is an object discriminated by its `type` field. Unknown
//! inbound types decode to [`InboundMessage::Unknown`] so that newer clients
//! never break the session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

/// Messages a participant may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Answer the active question.
    SubmitAnswer {
        /// Free-text answer.
        answer: String,
    },
    /// Ask for the caller's own score.
    GetScore,
    /// Any `type` this version does not recognize.
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Decode a raw text frame.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Wire name of the message kind, for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SubmitAnswer { .. } => "submit_answer",
            Self::GetScore => "get_score",
            Self::Unknown => "unknown",
        }
    }
}

/// Messages the coordinator sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A round has started (to all).
    NewQuestion {
        /// Question text.
        question: String,
    },
    /// Full score table after a round (to all).
    Scores {
        /// Participant name to cumulative score.
        scores: HashMap<String, u64>,
    },
    /// Reply to `get_score` (to the requester only).
    Score {
        /// The requester's cumulative score.
        score: u64,
    },
}

impl OutboundMessage {
    /// Wire name of the message kind, for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewQuestion { .. } => "new_question",
            Self::Scores { .. } => "scores",
            Self::Score { .. } => "score",
        }
    }
}
