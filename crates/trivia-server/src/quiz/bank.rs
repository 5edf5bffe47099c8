//! Question bank loading and validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// One question with its expected answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within the bank.
    pub id: String,
    /// Text broadcast to players.
    pub question: String,
    /// Expected answer, compared case-insensitively after trimming.
    pub answer: String,
}

impl Question {
    /// Convenience constructor.
    pub fn new(id: &str, question: &str, answer: &str) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Why a question bank could not be loaded.
#[derive(Debug, Error)]
pub enum QuestionBankError {
    /// The file could not be read.
    #[error("failed to read question bank {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a JSON array of questions.
    #[error("failed to parse question bank: {0}")]
    Json(#[from] serde_json::Error),
    /// The bank has no questions.
    #[error("question bank is empty")]
    Empty,
    /// A question has a blank id.
    #[error("question #{0} has an empty id")]
    MissingId(usize),
    /// Two questions share an id.
    #[error("duplicate question id: {0}")]
    DuplicateId(String),
    /// A question has a blank answer.
    #[error("question {0} has an empty answer")]
    MissingAnswer(String),
}

/// An ordered, validated list of questions.
#[derive(Clone, Debug)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Validate `questions` and wrap them.
    pub fn new(questions: Vec<Question>) -> Result<Self, QuestionBankError> {
        if questions.is_empty() {
            return Err(QuestionBankError::Empty);
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for (i, q) in questions.iter().enumerate() {
            if q.id.trim().is_empty() {
                return Err(QuestionBankError::MissingId(i));
            }
            if !seen.insert(q.id.as_str()) {
                return Err(QuestionBankError::DuplicateId(q.id.clone()));
            }
            if q.answer.trim().is_empty() {
                return Err(QuestionBankError::MissingAnswer(q.id.clone()));
            }
        }
        Ok(Self { questions })
    }

    /// Parse a JSON array of `{id, question, answer}` objects.
    pub fn from_json(json: &str) -> Result<Self, QuestionBankError> {
        Self::new(serde_json::from_str(json)?)
    }

    /// Load and validate a bank file.
    pub fn load(path: &Path) -> Result<Self, QuestionBankError> {
        let content = std::fs::read_to_string(path).map_err(|source| QuestionBankError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bank = Self::from_json(&content)?;
        info!(?path, questions = bank.len(), "question bank loaded");
        Ok(bank)
    }

    /// Load `path` when given, otherwise fall back to [`QuestionBank::sample`].
    pub fn load_or_sample(path: Option<&Path>) -> Result<Self, QuestionBankError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                info!("no question bank configured, using built-in sample");
                Ok(Self::sample())
            }
        }
    }

    /// A small built-in bank.
    pub fn sample() -> Self {
        Self {
            questions: vec![
                Question::new("q1", "What is the capital of France?", "Paris"),
                Question::new("q2", "How many legs does a spider have?", "8"),
                Question::new("q3", "Which planet is known as the Red Planet?", "Mars"),
                Question::new("q4", "What is the chemical symbol for gold?", "Au"),
                Question::new("q5", "Who wrote \"Romeo and Juliet\"?", "Shakespeare"),
            ],
        }
    }

    /// Questions in play order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Number of questions.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always `false`; an empty bank is rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
