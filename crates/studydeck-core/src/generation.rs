//! Turning study material into a saved session.

use crate::db::{NewStudySession, StudyStore};
use crate::gemini::StudyAssistant;
use crate::{Result, StudyError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use studydeck_types::{Difficulty, StudyMaterialInput, StudySession};
use tracing::info;
use uuid::Uuid;

/// A request to generate study aids.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub material: StudyMaterialInput,
    #[serde(default)]
    pub difficulty: Difficulty,
}

/// Reject material with neither text nor attachments.
pub fn validate_material(material: &StudyMaterialInput) -> Result<()> {
    if material.is_empty() {
        return Err(StudyError::Validation(
            "Please provide some study material or upload a file.".into(),
        ));
    }
    Ok(())
}

/// Title used when the user leaves it blank.
pub fn default_title(now: DateTime<Utc>) -> String {
    format!("Session on {}", now.format("%-m/%-d/%Y"))
}

/// Generate study aids and store them as a new session.
///
/// Nothing is stored unless generation fully succeeds.
pub async fn create_session(
    store: &Arc<StudyStore>,
    assistant: &dyn StudyAssistant,
    user_id: Uuid,
    request: GenerateRequest,
) -> Result<StudySession> {
    validate_material(&request.material)?;

    let study_aids = assistant
        .generate_study_aids(&request.material, request.difficulty)
        .await?;

    let title = match request.title.trim() {
        "" => default_title(Utc::now()),
        t => t.to_string(),
    };

    let new = NewStudySession {
        title,
        study_material: request.material,
        study_aids,
    };
    let session = store
        .call(move |store| store.insert_session(user_id, new))
        .await?;
    info!(
        target: "studydeck::api",
        "Created session {} ({} questions, {} cards)",
        session.id,
        session.study_aids.quiz.len(),
        session.study_aids.flashcards.len()
    );
    Ok(session)
}
