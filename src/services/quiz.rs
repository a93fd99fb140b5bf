//! Test-taking state machine and attempt store.
//!
//! DESIGN
//! ======
//! A [`TestAttempt`] walks one question at a time. The learner must pick an
//! option before moving forward, may step back freely, and can submit at any
//! point; unanswered questions then count as wrong. Once finished the attempt
//! is read-only and exposes its score and per-question results.
//!
//! Attempts live in an [`AttemptStore`] keyed by id and tagged with the user
//! that created them. Lookups by any other user behave as if the id did not
//! exist.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::generate::Question;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Answering,
    Finished,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("a test needs at least one question")]
    NoQuestions,
    #[error("question {index} is malformed")]
    MalformedQuestion { index: usize },
    #[error("option is not one of the current question's options")]
    InvalidOption,
    #[error("select an answer before moving on")]
    NotAnswered,
    #[error("test already submitted")]
    Finished,
}

impl crate::error::ErrorCode for QuizError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoQuestions => "E_NO_QUESTIONS",
            Self::MalformedQuestion { .. } => "E_MALFORMED_QUESTION",
            Self::InvalidOption => "E_INVALID_OPTION",
            Self::NotAnswered => "E_NOT_ANSWERED",
            Self::Finished => "E_ATTEMPT_FINISHED",
        }
    }
}

// =============================================================================
// ATTEMPT
// =============================================================================

#[derive(Debug, Clone)]
pub struct TestAttempt {
    questions: Vec<Question>,
    answers: Vec<Option<String>>,
    current: usize,
    phase: Phase,
}

/// Outcome of one question after the attempt is finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question: String,
    pub your_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
}

impl TestAttempt {
    /// # Errors
    ///
    /// Returns [`QuizError::NoQuestions`] for an empty list and
    /// [`QuizError::MalformedQuestion`] for the first question that could
    /// never be answered correctly.
    pub fn new(questions: Vec<Question>) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        if let Some(index) = questions.iter().position(|q| !q.is_well_formed()) {
            return Err(QuizError::MalformedQuestion { index });
        }
        let answers = vec![None; questions.len()];
        Ok(Self { questions, answers, current: 0, phase: Phase::Answering })
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    #[must_use]
    pub fn selected_answer(&self) -> Option<&str> {
        self.answers[self.current].as_deref()
    }

    /// Record `option` for the current question, replacing any earlier pick.
    ///
    /// # Errors
    ///
    /// [`QuizError::Finished`] after submission, [`QuizError::InvalidOption`]
    /// when `option` is not offered by the current question.
    pub fn select_answer(&mut self, option: &str) -> Result<(), QuizError> {
        self.ensure_answering()?;
        if !self.current_question().options.iter().any(|o| o == option) {
            return Err(QuizError::InvalidOption);
        }
        self.answers[self.current] = Some(option.to_owned());
        Ok(())
    }

    /// Advance, or finish when on the last question.
    ///
    /// # Errors
    ///
    /// [`QuizError::NotAnswered`] if the current question has no answer.
    pub fn next(&mut self) -> Result<(), QuizError> {
        self.ensure_answering()?;
        if self.answers[self.current].is_none() {
            return Err(QuizError::NotAnswered);
        }
        if self.current + 1 < self.questions.len() {
            self.current += 1;
        } else {
            self.phase = Phase::Finished;
        }
        Ok(())
    }

    /// Step back one question. No-op on the first question.
    ///
    /// # Errors
    ///
    /// [`QuizError::Finished`] after submission.
    pub fn previous(&mut self) -> Result<(), QuizError> {
        self.ensure_answering()?;
        self.current = self.current.saturating_sub(1);
        Ok(())
    }

    /// Finish now. Submitting twice is harmless.
    pub fn submit(&mut self) {
        self.phase = Phase::Finished;
    }

    #[must_use]
    pub fn score(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.answers)
            .filter(|(q, a)| a.as_deref() == Some(q.correct_answer.as_str()))
            .count()
    }

    #[must_use]
    pub fn results(&self) -> Vec<QuestionResult> {
        self.questions
            .iter()
            .zip(&self.answers)
            .map(|(q, a)| QuestionResult {
                question: q.question.clone(),
                your_answer: a.clone(),
                correct_answer: q.correct_answer.clone(),
                is_correct: a.as_deref() == Some(q.correct_answer.as_str()),
            })
            .collect()
    }

    /// Share of questions already passed, rounded half up.
    #[must_use]
    pub fn progress_percent(&self) -> u32 {
        let len = self.questions.len();
        let pct = (200 * self.current + len) / (2 * len);
        u32::try_from(pct).unwrap_or(100)
    }

    fn ensure_answering(&self) -> Result<(), QuizError> {
        match self.phase {
            Phase::Answering => Ok(()),
            Phase::Finished => Err(QuizError::Finished),
        }
    }

    /// Client-facing snapshot. Correct answers stay hidden until finished.
    #[must_use]
    pub fn view(&self, id: Uuid) -> AttemptView {
        let finished = self.phase == Phase::Finished;
        let current = self.current_question();
        AttemptView {
            id,
            phase: self.phase,
            current_index: self.current,
            total: self.questions.len(),
            progress_percent: self.progress_percent(),
            question: (!finished).then(|| CurrentQuestion {
                question: current.question.clone(),
                options: current.options.clone(),
                selected_answer: self.selected_answer().map(str::to_owned),
            }),
            score: finished.then(|| self.score()),
            results: finished.then(|| self.results()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub selected_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    pub id: Uuid,
    pub phase: Phase,
    pub current_index: usize,
    pub total: usize,
    pub progress_percent: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<CurrentQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<QuestionResult>>,
}

// =============================================================================
// STORE
// =============================================================================

/// Attempts kept per user. Starting another evicts that user's oldest.
pub const MAX_ATTEMPTS_PER_OWNER: usize = 5;

struct OwnedAttempt {
    owner_id: String,
    seq: u64,
    attempt: TestAttempt,
}

#[derive(Default)]
struct Attempts {
    next_seq: u64,
    by_id: HashMap<Uuid, OwnedAttempt>,
}

#[derive(Clone, Default)]
pub struct AttemptStore {
    attempts: Arc<RwLock<Attempts>>,
}

impl AttemptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new attempt, evicting the owner's oldest ones past
    /// [`MAX_ATTEMPTS_PER_OWNER`].
    pub async fn insert(&self, owner_id: &str, attempt: TestAttempt) -> Uuid {
        let id = Uuid::new_v4();
        let mut attempts = self.attempts.write().await;

        let mut owned: Vec<(u64, Uuid)> = attempts
            .by_id
            .iter()
            .filter(|(_, a)| a.owner_id == owner_id)
            .map(|(id, a)| (a.seq, *id))
            .collect();
        if owned.len() >= MAX_ATTEMPTS_PER_OWNER {
            owned.sort_unstable();
            let excess = owned.len() + 1 - MAX_ATTEMPTS_PER_OWNER;
            for (_, old) in owned.into_iter().take(excess) {
                attempts.by_id.remove(&old);
                tracing::debug!(id = %old, %owner_id, "quiz: evicted oldest attempt");
            }
        }

        let seq = attempts.next_seq;
        attempts.next_seq += 1;
        attempts
            .by_id
            .insert(id, OwnedAttempt { owner_id: owner_id.to_owned(), seq, attempt });
        id
    }

    /// Snapshot of an attempt owned by `owner_id`.
    pub async fn view(&self, id: Uuid, owner_id: &str) -> Option<AttemptView> {
        let attempts = self.attempts.read().await;
        attempts
            .by_id
            .get(&id)
            .filter(|a| a.owner_id == owner_id)
            .map(|a| a.attempt.view(id))
    }

    /// Apply `f` to an attempt owned by `owner_id`. `None` when not found.
    pub async fn update<R>(&self, id: Uuid, owner_id: &str, f: impl FnOnce(&mut TestAttempt) -> R) -> Option<(R, AttemptView)> {
        let mut attempts = self.attempts.write().await;
        let owned = attempts.by_id.get_mut(&id).filter(|a| a.owner_id == owner_id)?;
        let out = f(&mut owned.attempt);
        Some((out, owned.attempt.view(id)))
    }

    /// Delete an attempt. Returns false when not found for this owner.
    pub async fn remove(&self, id: Uuid, owner_id: &str) -> bool {
        let mut attempts = self.attempts.write().await;
        if attempts.by_id.get(&id).is_some_and(|a| a.owner_id == owner_id) {
            attempts.by_id.remove(&id);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
#[path = "quiz_test.rs"]
mod tests;
