//! Generative AI collaborator.
//!
//! [`StudyAssistant`] is what the rest of the crate talks to; [`GeminiClient`]
//! implements it over the Gemini `generateContent` REST endpoint. Requests are
//! never retried: a failed generation or translation is reported to the user,
//! who can simply try again.

use crate::{Result, StudyError};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use studydeck_types::{Difficulty, Flashcard, Message, QuizQuestion, Sender, StudyAids, StudyMaterialInput};
use thiserror::Error;
use tracing::{debug, error};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub const QUIZ_QUESTION_COUNT: usize = 10;
pub const FLASHCARD_COUNT: usize = 15;

/// The AI operations the study tools depend on.
pub trait StudyAssistant: Send + Sync + 'static {
    /// Produce a summary, quiz and flashcard deck for the material.
    fn generate_study_aids<'a>(
        &'a self,
        material: &'a StudyMaterialInput,
        difficulty: Difficulty,
    ) -> BoxFuture<'a, Result<StudyAids>>;

    /// Answer `message` as a tutor limited to `study_material`, given the conversation so far.
    fn chat_reply<'a>(
        &'a self,
        study_material: &'a str,
        history: &'a [Message],
        message: &'a str,
    ) -> BoxFuture<'a, Result<String>>;

    fn translate_text<'a>(&'a self, text: &'a str, language: &'a str) -> BoxFuture<'a, Result<String>>;

    /// Translate both sides of every card, keeping the deck's shape.
    fn translate_flashcards<'a>(
        &'a self,
        cards: &'a [Flashcard],
        language: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Flashcard>>>;
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Gemini API key is not configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: reqwest::StatusCode, body: String },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty response")]
    EmptyResponse,
    #[error("invalid data structure: {0}")]
    InvalidStructure(&'static str),
}

// Wire format

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl Content {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part::text(text)],
        }
    }
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }
}

fn flashcards_schema() -> Value {
    json!({
        "type": "ARRAY",
        "description": format!("A set of {} flashcards with a question and a concise answer.", FLASHCARD_COUNT),
        "items": {
            "type": "OBJECT",
            "properties": {
                "question": { "type": "STRING", "description": "The question for the front of the flashcard." },
                "answer": { "type": "STRING", "description": "The answer for the back of the flashcard." }
            },
            "required": ["question", "answer"]
        }
    })
}

fn study_aids_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": {
                "type": "STRING",
                "description": "A detailed, point-wise summary formatted as markdown bullet points, without bold text."
            },
            "quiz": {
                "type": "ARRAY",
                "description": format!("A multiple-choice quiz with {} questions.", QUIZ_QUESTION_COUNT),
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "question": { "type": "STRING" },
                        "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "correctAnswer": { "type": "STRING" }
                    },
                    "required": ["question", "options", "correctAnswer"]
                }
            },
            "flashcards": flashcards_schema(),
            "difficulty": { "type": "STRING", "enum": ["Easy", "Medium", "Hard"] }
        },
        "required": ["summary", "quiz", "flashcards", "difficulty"]
    })
}

fn study_aids_prompt(material: &StudyMaterialInput, difficulty: Difficulty) -> String {
    format!(
        "Based on the following study material (which may include text and/or files like PDFs and images), generate:\n\
         1. A detailed summary as markdown bullet points. Do not use bold formatting.\n\
         2. A {count}-question multiple-choice quiz with a difficulty level of: {difficulty}.\n\
         3. {cards} flashcards.\n\n\
         Text Material (if any):\n---\n{text}\n---\n\n\
         Respond in the specified JSON format, with '{difficulty}' as the difficulty.",
        count = QUIZ_QUESTION_COUNT,
        cards = FLASHCARD_COUNT,
        text = material.text,
        difficulty = difficulty,
    )
}

fn tutor_instruction(study_material: &str) -> String {
    format!(
        "You are a helpful and encouraging AI tutor. Your knowledge is strictly limited to the \
         following study material. Do not answer questions outside of this context. Be concise \
         and clear in your explanations.\n\n\
         --- STUDY MATERIAL ---\n{}\n--- END STUDY MATERIAL ---",
        study_material
    )
}

/// Map a conversation to alternating turns. Leading AI messages (the greeting)
/// are not part of the model's history.
fn chat_contents(history: &[Message], message: &str) -> Vec<Content> {
    history
        .iter()
        .skip_while(|m| !m.is_user())
        .map(|m| {
            let role = match m.sender {
                Sender::User => "user",
                Sender::Ai => "model",
            };
            Content::text(Some(role), m.text.clone())
        })
        .chain(std::iter::once(Content::text(Some("user"), message)))
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStudyAids {
    summary: Option<String>,
    quiz: Option<Vec<QuizQuestion>>,
    flashcards: Option<Vec<Flashcard>>,
    difficulty: Option<Difficulty>,
}

/// Parse a generation response. Partial results are rejected.
fn parse_study_aids(text: &str, requested: Difficulty) -> std::result::Result<StudyAids, GeminiError> {
    let raw: RawStudyAids = serde_json::from_str(text)?;

    let summary = raw
        .summary
        .filter(|s| !s.trim().is_empty())
        .ok_or(GeminiError::InvalidStructure("missing summary"))?;
    let quiz = raw.quiz.ok_or(GeminiError::InvalidStructure("missing quiz"))?;
    let flashcards = raw
        .flashcards
        .ok_or(GeminiError::InvalidStructure("missing flashcards"))?;

    Ok(StudyAids {
        summary,
        quiz,
        flashcards,
        difficulty: raw.difficulty.unwrap_or(requested),
    })
}

fn translation_prompt(text: &str, language: &str) -> String {
    format!(
        "Translate the following text to {}. Return ONLY the translated text, without any \
         introductory phrases, explanations, or markdown formatting.\n\n\
         Text to translate:\n---\n{}\n---",
        language, text
    )
}

fn flashcards_translation_prompt(cards: &[Flashcard], language: &str) -> std::result::Result<String, GeminiError> {
    Ok(format!(
        "Translate the 'question' and 'answer' values for each object in the following JSON array \
         to {}. Return the translated array in the exact same JSON structure. Do not add any extra \
         commentary or text.\n\n\
         JSON to translate:\n---\n{}\n---",
        language,
        serde_json::to_string(cards)?
    ))
}

/// Gemini REST client.
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn is_available(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    async fn generate(&self, request: &GenerateRequest) -> std::result::Result<String, GeminiError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(GeminiError::NotConfigured)?;

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        );

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GeminiError::HttpStatus { status, body });
        }

        let bytes = resp.bytes().await?;
        let parsed: GenerateResponse = serde_json::from_slice(&bytes)?;
        let text = parsed.text().ok_or(GeminiError::EmptyResponse)?;
        debug!(target: "studydeck::ai", "Gemini returned {} bytes of text", text.len());
        Ok(text)
    }

    async fn try_generate_study_aids(
        &self,
        material: &StudyMaterialInput,
        difficulty: Difficulty,
    ) -> std::result::Result<StudyAids, GeminiError> {
        let mut parts = vec![Part::text(study_aids_prompt(material, difficulty))];
        parts.extend(material.files.iter().map(|file| Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: file.mime_type.clone(),
                data: file.data.clone(),
            }),
        }));

        let request = GenerateRequest {
            contents: vec![Content { role: Some("user".into()), parts }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
                response_schema: study_aids_schema(),
            }),
        };

        let text = self.generate(&request).await?;
        parse_study_aids(&text, difficulty)
    }

    async fn try_translate_flashcards(
        &self,
        cards: &[Flashcard],
        language: &str,
    ) -> std::result::Result<Vec<Flashcard>, GeminiError> {
        let request = GenerateRequest {
            contents: vec![Content::text(Some("user"), flashcards_translation_prompt(cards, language)?)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
                response_schema: flashcards_schema(),
            }),
        };
        let text = self.generate(&request).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl StudyAssistant for GeminiClient {
    fn generate_study_aids<'a>(
        &'a self,
        material: &'a StudyMaterialInput,
        difficulty: Difficulty,
    ) -> BoxFuture<'a, Result<StudyAids>> {
        Box::pin(async move {
            self.try_generate_study_aids(material, difficulty)
                .await
                .map_err(|e| {
                    error!(target: "studydeck::ai", "Error generating study aids: {}", e);
                    StudyError::Ai("Failed to generate study aids. Please try again.".into())
                })
        })
    }

    fn chat_reply<'a>(
        &'a self,
        study_material: &'a str,
        history: &'a [Message],
        message: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let request = GenerateRequest {
                contents: chat_contents(history, message),
                system_instruction: Some(Content::text(None, tutor_instruction(study_material))),
                generation_config: None,
            };
            self.generate(&request).await.map_err(|e| {
                error!(target: "studydeck::ai", "Tutor chat error: {}", e);
                StudyError::Ai("Failed to get a reply from the tutor.".into())
            })
        })
    }

    fn translate_text<'a>(&'a self, text: &'a str, language: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let request = GenerateRequest {
                contents: vec![Content::text(Some("user"), translation_prompt(text, language))],
                system_instruction: None,
                generation_config: None,
            };
            match self.generate(&request).await {
                Ok(translated) => Ok(translated.trim().to_string()),
                Err(e) => {
                    error!(target: "studydeck::ai", "Error translating text: {}", e);
                    Err(StudyError::Ai("Failed to translate text.".into()))
                }
            }
        })
    }

    fn translate_flashcards<'a>(
        &'a self,
        cards: &'a [Flashcard],
        language: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Flashcard>>> {
        Box::pin(async move {
            self.try_translate_flashcards(cards, language)
                .await
                .map_err(|e| {
                    error!(target: "studydeck::ai", "Error translating flashcards: {}", e);
                    StudyError::Ai("Failed to translate flashcards.".into())
                })
        })
    }
}
