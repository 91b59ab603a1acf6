//! Generated study aids: summary, quiz and flashcards.
//!
//! Field names follow the JSON shape produced by the AI service, so these
//! types deserialize model output directly and are stored verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quiz difficulty requested from (and echoed back by) the AI service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!("Invalid difficulty: '{}'. Use Easy, Medium or Hard.", s)),
        }
    }
}

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    /// Four candidate answers.
    pub options: Vec<String>,
    /// One of `options`.
    pub correct_answer: String,
}

/// A flashcard with a front (question) and back (answer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

/// The bundle generated once per study session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyAids {
    /// Point-wise markdown summary.
    pub summary: String,
    pub quiz: Vec<QuizQuestion>,
    pub flashcards: Vec<Flashcard>,
    pub difficulty: Difficulty,
}
