//! Shared harness for the HTTP integration tests.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use studydeck_core::{StudyAssistant, StudyError};
use studydeck_server::{app, config::Config, state::AppState};
use studydeck_types::{Difficulty, Flashcard, Message, QuizQuestion, StudyAids, StudyMaterialInput};
use tempfile::TempDir;
use tower::ServiceExt;

pub const DEBOUNCE_MS: u64 = 20;
pub const SLIDE_MS: u64 = 100;

/// Deterministic assistant: three questions, three cards, echoing tutor.
#[derive(Default)]
pub struct ScriptedAssistant {
    pub fail: AtomicBool,
}

impl ScriptedAssistant {
    fn check(&self) -> studydeck_core::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StudyError::Ai("Failed to generate study aids.".into()))
        } else {
            Ok(())
        }
    }
}

pub fn question(n: usize) -> QuizQuestion {
    QuizQuestion {
        question: format!("Question {}?", n),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct_answer: "A".into(),
    }
}

pub fn card(n: usize) -> Flashcard {
    Flashcard {
        question: format!("Front {}", n),
        answer: format!("Back {}", n),
    }
}

impl StudyAssistant for ScriptedAssistant {
    fn generate_study_aids<'a>(
        &'a self,
        material: &'a StudyMaterialInput,
        difficulty: Difficulty,
    ) -> BoxFuture<'a, studydeck_core::Result<StudyAids>> {
        Box::pin(async move {
            self.check()?;
            Ok(StudyAids {
                summary: format!("* {}", material.text.trim()),
                quiz: (0..3).map(question).collect(),
                flashcards: (0..3).map(card).collect(),
                difficulty,
            })
        })
    }

    fn chat_reply<'a>(
        &'a self,
        _study_material: &'a str,
        history: &'a [Message],
        message: &'a str,
    ) -> BoxFuture<'a, studydeck_core::Result<String>> {
        Box::pin(async move {
            self.check()?;
            Ok(format!("[{}] {}", history.len(), message))
        })
    }

    fn translate_text<'a>(
        &'a self,
        text: &'a str,
        language: &'a str,
    ) -> BoxFuture<'a, studydeck_core::Result<String>> {
        Box::pin(async move {
            self.check()?;
            Ok(format!("{}:{}", language, text))
        })
    }

    fn translate_flashcards<'a>(
        &'a self,
        cards: &'a [Flashcard],
        language: &'a str,
    ) -> BoxFuture<'a, studydeck_core::Result<Vec<Flashcard>>> {
        Box::pin(async move {
            self.check()?;
            Ok(cards
                .iter()
                .map(|c| Flashcard {
                    question: format!("{}:{}", language, c.question),
                    answer: format!("{}:{}", language, c.answer),
                })
                .collect())
        })
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: Arc<AppState>,
    pub assistant: Arc<ScriptedAssistant>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let static_dir = dir.path().join("static");
        std::fs::create_dir_all(&static_dir).unwrap();

        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            static_dir,
            db_path: dir.path().join("test.db"),
            debounce_ms: DEBOUNCE_MS,
            slide_ms: SLIDE_MS,
            bcrypt_cost: 4,
            ..Config::default()
        };

        let assistant = Arc::new(ScriptedAssistant::default());
        let state = Arc::new(
            AppState::with_assistant(config, assistant.clone()).expect("Failed to create AppState"),
        );

        Self {
            app: app(state.clone()),
            state,
            assistant,
            _dir: dir,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Sign up a fresh account and return its bearer token.
    pub async fn sign_up(&self, email: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "email": email, "password": "secret123", "name": "Tester" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Generate a session and return its id.
    pub async fn create_session(&self, token: &str, text: &str) -> String {
        let (status, body) = self
            .post(
                "/api/sessions",
                token,
                json!({ "title": "Photosynthesis", "text": text, "difficulty": "Hard" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }
}

/// Wait out the debounce window and any background writes.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(DEBOUNCE_MS * 5 + SLIDE_MS * 4)).await;
}
