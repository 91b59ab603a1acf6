//! Core study-session logic for Studydeck.

mod analytics;
mod auth;
mod carousel;
mod db;
mod error;
mod gemini;
mod generation;
mod pagination;
mod quiz;
mod scheduler;
mod sync;
mod tools;

pub use analytics::{study_streak, top_subjects, Dashboard, QuizAnalytics, SubjectCount};
pub use auth::{AuthService, AuthSession, MIN_PASSWORD_LEN};
pub use carousel::{
    Carousel, CarouselError, CarouselPhase, Direction, NavRequest, Transition, SLIDE_DURATION,
};
pub use db::{NewStudySession, StudyStore};
pub use error::StudyError;
pub use gemini::{GeminiClient, GeminiConfig, GeminiError, StudyAssistant};
pub use generation::{create_session, default_title, validate_material, GenerateRequest};
pub use pagination::{paginate, PageItem, DEFAULT_SIBLING_COUNT};
pub use quiz::{QuizError, QuizSession, QuizStatus};
pub use scheduler::Debouncer;
pub use sync::{SavePolicy, StateSync, ToolStateStore, DEFAULT_DEBOUNCE};
pub use tools::{
    FlashcardsTool, FlashcardsView, QuizTool, QuizView, ToolTimings, TutorTool, TutorView,
    TUTOR_ERROR_REPLY, TUTOR_GREETING,
};

/// Result type for Studydeck operations.
pub type Result<T> = std::result::Result<T, StudyError>;
