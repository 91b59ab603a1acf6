//! Study session types.

use crate::StudyAids;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An inline attachment (PDF or image) sent to the AI service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    /// e.g. "application/pdf", "image/png"
    pub mime_type: String,
    /// Base64-encoded file content.
    pub data: String,
}

/// The material a session was generated from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyMaterialInput {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FilePart>,
}

impl StudyMaterialInput {
    /// True when there is neither text nor any attachment.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.files.is_empty()
    }
}

/// One completed quiz attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub score: u32,
    pub total: u32,
    pub date: DateTime<Utc>,
}

impl QuizResult {
    /// Score as a fraction in `[0, 1]`.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.score as f64 / self.total as f64
    }
}

/// A study session with its generated aids and quiz history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySession {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub study_material: StudyMaterialInput,
    pub study_aids: StudyAids,
    /// Most recent attempt first.
    #[serde(default)]
    pub quiz_results: Vec<QuizResult>,
}

impl StudySession {
    /// Context handed to the tutor: the raw text, or the summary for
    /// file-only sessions.
    pub fn tutor_context(&self) -> &str {
        if self.study_material.text.trim().is_empty() {
            &self.study_aids.summary
        } else {
            &self.study_material.text
        }
    }

    /// Best attempt as a rounded percentage, if any attempt exists.
    pub fn best_score_percent(&self) -> Option<u32> {
        self.quiz_results
            .iter()
            .map(QuizResult::ratio)
            .fold(None, |best: Option<f64>, r| Some(best.map_or(r, |b| b.max(r))))
            .map(|best| (best * 100.0).round() as u32)
    }
}

/// Summary view of a session for the dashboard history list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub quiz_count: usize,
    /// Best attempt as a rounded percentage, if any attempt exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_score_percent: Option<u32>,
}

impl From<&StudySession> for SessionSummary {
    fn from(s: &StudySession) -> Self {
        Self {
            id: s.id,
            title: s.title.clone(),
            created_at: s.created_at,
            quiz_count: s.quiz_results.len(),
            best_score_percent: s.best_score_percent(),
        }
    }
}
