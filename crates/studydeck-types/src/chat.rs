//! Tutor chat message types.
//!
//! The tutor keeps an ordered list of messages that is persisted as the
//! tutor's tool state and replayed as conversation context for the AI.

use serde::{Deserialize, Serialize};

/// Who sent a tutor message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The student
    User,
    /// The AI tutor
    Ai,
}

/// A single message in the tutor conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

impl Message {
    /// Create a student message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    /// Create a tutor reply.
    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Ai,
            text: text.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}
