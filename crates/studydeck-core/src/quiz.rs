//! Quiz attempt state machine.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use studydeck_types::{QuizQuestion, QuizResult};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    #[default]
    InProgress,
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("the quiz has already been submitted")]
    AlreadySubmitted,
    #[error("question {index} does not exist (quiz has {len})")]
    NoSuchQuestion { index: usize, len: usize },
    #[error("select an answer before moving on")]
    NoSelection,
    #[error("{answered} of {total} questions answered")]
    Incomplete { answered: usize, total: usize },
    #[error("the quiz has no questions")]
    Empty,
}

/// One attempt at a quiz.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<QuizQuestion>,
    current: usize,
    selected: BTreeMap<usize, String>,
    status: QuizStatus,
}

impl QuizSession {
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        Self {
            questions,
            current: 0,
            selected: BTreeMap::new(),
            status: QuizStatus::InProgress,
        }
    }

    /// Resume an attempt. The index is clamped into range and answers for
    /// questions that no longer exist are dropped.
    pub fn resume(
        questions: Vec<QuizQuestion>,
        current: usize,
        mut selected: BTreeMap<usize, String>,
    ) -> Self {
        let len = questions.len();
        selected.retain(|index, _| *index < len);
        Self {
            current: current.min(len.saturating_sub(1)),
            questions,
            selected,
            status: QuizStatus::InProgress,
        }
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.current)
    }

    pub fn selected_answers(&self) -> &BTreeMap<usize, String> {
        &self.selected
    }

    pub fn status(&self) -> QuizStatus {
        self.status
    }

    pub fn is_last_question(&self) -> bool {
        self.current + 1 >= self.questions.len()
    }

    /// Record `option` for a question, replacing any earlier choice.
    pub fn select_answer(&mut self, index: usize, option: impl Into<String>) -> Result<(), QuizError> {
        if self.status == QuizStatus::Submitted {
            return Err(QuizError::AlreadySubmitted);
        }
        if index >= self.questions.len() {
            return Err(QuizError::NoSuchQuestion {
                index,
                len: self.questions.len(),
            });
        }
        self.selected.insert(index, option.into());
        Ok(())
    }

    /// Whether the current question has an answer.
    pub fn can_advance(&self) -> bool {
        self.status == QuizStatus::InProgress && self.selected.contains_key(&self.current)
    }

    /// Whether every question has an answer.
    pub fn can_submit(&self) -> bool {
        self.status == QuizStatus::InProgress
            && !self.questions.is_empty()
            && self.selected.len() == self.questions.len()
    }

    pub fn advance(&mut self) -> Result<usize, QuizError> {
        if self.status == QuizStatus::Submitted {
            return Err(QuizError::AlreadySubmitted);
        }
        if !self.can_advance() {
            return Err(QuizError::NoSelection);
        }
        if !self.is_last_question() {
            self.current += 1;
        }
        Ok(self.current)
    }

    pub fn retreat(&mut self) -> Result<usize, QuizError> {
        if self.status == QuizStatus::Submitted {
            return Err(QuizError::AlreadySubmitted);
        }
        self.current = self.current.saturating_sub(1);
        Ok(self.current)
    }

    /// Number of selections that match the correct answer.
    pub fn score(&self) -> u32 {
        self.questions
            .iter()
            .enumerate()
            .filter(|(i, q)| self.selected.get(i) == Some(&q.correct_answer))
            .count() as u32
    }

    /// The result the attempt would get if submitted now.
    pub fn result(&self) -> Result<QuizResult, QuizError> {
        if self.status == QuizStatus::Submitted {
            return Err(QuizError::AlreadySubmitted);
        }
        if self.questions.is_empty() {
            return Err(QuizError::Empty);
        }
        if !self.can_submit() {
            return Err(QuizError::Incomplete {
                answered: self.selected.len(),
                total: self.questions.len(),
            });
        }

        Ok(QuizResult {
            score: self.score(),
            total: self.questions.len() as u32,
            date: Utc::now(),
        })
    }

    /// Finish the attempt and produce its result.
    pub fn submit(&mut self) -> Result<QuizResult, QuizError> {
        let result = self.result()?;
        self.status = QuizStatus::Submitted;
        Ok(result)
    }

    /// Start over with no answers.
    pub fn restart(&mut self) {
        self.selected.clear();
        self.current = 0;
        self.status = QuizStatus::InProgress;
    }
}
