//! Interactive tools and their resumable state.

use crate::Message;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// The interactive study tools that keep resumable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Quiz,
    Flashcards,
    Tutor,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Quiz => "quiz",
            ToolKind::Flashcards => "flashcards",
            ToolKind::Tutor => "tutor",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quiz" => Ok(ToolKind::Quiz),
            "flashcards" => Ok(ToolKind::Flashcards),
            "tutor" => Ok(ToolKind::Tutor),
            _ => Err(format!("Unknown tool: '{}'", s)),
        }
    }
}

/// Identity of one tool-state row. At most one row exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToolKey {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub tool: ToolKind,
}

impl ToolKey {
    pub fn new(user_id: Uuid, session_id: Uuid, tool: ToolKind) -> Self {
        Self {
            user_id,
            session_id,
            tool,
        }
    }
}

impl fmt::Display for ToolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.user_id, self.session_id, self.tool)
    }
}

/// Persisted quiz progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizToolState {
    pub current_question_index: usize,
    #[serde(default)]
    pub selected_answers: BTreeMap<usize, String>,
}

/// Persisted flashcard position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardsToolState {
    pub current_index: usize,
}

/// Persisted tutor conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorToolState {
    pub messages: Vec<Message>,
}
