//! Interactive study tools.
//!
//! Each tool pairs a state machine with a [`StateSync`] adapter. Mounting a
//! tool loads whatever was saved for it; mutations save in the background;
//! terminal actions clear the saved state.

use crate::carousel::{Carousel, CarouselPhase, NavRequest, SLIDE_DURATION};
use crate::gemini::StudyAssistant;
use crate::pagination::{paginate, PageItem, DEFAULT_SIBLING_COUNT};
use crate::quiz::{QuizSession, QuizStatus};
use crate::sync::{SavePolicy, StateSync, ToolStateStore, DEFAULT_DEBOUNCE};
use crate::{Result, StudyError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use studydeck_types::{
    Flashcard, FlashcardsToolState, Message, QuizQuestion, QuizResult, QuizToolState, ToolKey,
    ToolKind, TutorToolState,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const TUTOR_GREETING: &str = "Hello! Ask me anything about your study material.";
pub const TUTOR_ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Timing knobs for the tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolTimings {
    /// Quiet period before quiz and flashcard state is saved.
    pub debounce: Duration,
    /// Length of each carousel animation phase.
    pub slide: Duration,
}

impl Default for ToolTimings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            slide: SLIDE_DURATION,
        }
    }
}

// ============================================================================
// Quiz
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct QuizView {
    pub status: QuizStatus,
    pub current_question_index: usize,
    pub total_questions: usize,
    pub question: Option<QuizQuestion>,
    pub selected_answers: BTreeMap<usize, String>,
    pub can_advance: bool,
    pub can_submit: bool,
    pub is_last_question: bool,
    /// Only present once submitted.
    pub score: Option<u32>,
}

pub struct QuizTool {
    quiz: QuizSession,
    sync: StateSync<QuizToolState>,
}

impl QuizTool {
    pub async fn mount(
        store: Arc<dyn ToolStateStore>,
        user_id: Uuid,
        session_id: Uuid,
        questions: Vec<QuizQuestion>,
        timings: ToolTimings,
    ) -> Self {
        let key = ToolKey::new(user_id, session_id, ToolKind::Quiz);
        let mut sync: StateSync<QuizToolState> = StateSync::new(
            store,
            key,
            SavePolicy::for_tool(ToolKind::Quiz, timings.debounce),
        );

        let quiz = match sync.load().await {
            Some(saved) => {
                debug!(target: "studydeck::tools", "Resuming quiz {} at question {}", key, saved.current_question_index);
                QuizSession::resume(questions, saved.current_question_index, saved.selected_answers)
            }
            None => QuizSession::new(questions),
        };

        Self { quiz, sync }
    }

    pub fn view(&self) -> QuizView {
        let submitted = self.quiz.status() == QuizStatus::Submitted;
        QuizView {
            status: self.quiz.status(),
            current_question_index: self.quiz.current_index(),
            total_questions: self.quiz.questions().len(),
            question: self.quiz.current_question().cloned(),
            selected_answers: self.quiz.selected_answers().clone(),
            can_advance: self.quiz.can_advance(),
            can_submit: self.quiz.can_submit(),
            is_last_question: self.quiz.is_last_question(),
            score: submitted.then(|| self.quiz.score()),
        }
    }

    pub fn select_answer(&mut self, index: usize, option: impl Into<String>) -> Result<QuizView> {
        self.quiz
            .select_answer(index, option)
            .map_err(|e| StudyError::transition(ToolKind::Quiz, e))?;
        self.persist();
        Ok(self.view())
    }

    pub fn next(&mut self) -> Result<QuizView> {
        self.quiz
            .advance()
            .map_err(|e| StudyError::transition(ToolKind::Quiz, e))?;
        self.persist();
        Ok(self.view())
    }

    pub fn previous(&mut self) -> Result<QuizView> {
        self.quiz
            .retreat()
            .map_err(|e| StudyError::transition(ToolKind::Quiz, e))?;
        self.persist();
        Ok(self.view())
    }

    /// Finish the attempt once `record` has stored its result in the
    /// session's quiz history. The saved progress is then cleared.
    ///
    /// If `record` fails the attempt stays open, answers and saved progress
    /// intact, and can be submitted again.
    pub async fn submit_with<F, Fut>(&mut self, record: F) -> Result<QuizResult>
    where
        F: FnOnce(QuizResult) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let result = self
            .quiz
            .result()
            .map_err(|e| StudyError::transition(ToolKind::Quiz, e))?;
        if let Err(e) = record(result.clone()).await {
            warn!(target: "studydeck::tools", "Quiz {} left open, result not recorded: {}", self.sync.key(), e);
            return Err(e);
        }

        self.quiz
            .submit()
            .map_err(|e| StudyError::transition(ToolKind::Quiz, e))?;
        self.sync.clear();
        info!(
            target: "studydeck::tools",
            "Quiz {} submitted: {}/{}",
            self.sync.key(),
            result.score,
            result.total
        );
        Ok(result)
    }

    pub fn restart(&mut self) -> QuizView {
        self.quiz.restart();
        self.sync.clear();
        self.view()
    }

    fn persist(&self) {
        if self.quiz.status() != QuizStatus::InProgress {
            return;
        }
        self.sync.save(&QuizToolState {
            current_question_index: self.quiz.current_index(),
            selected_answers: self.quiz.selected_answers().clone(),
        });
    }
}

// ============================================================================
// Flashcards
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct FlashcardsView {
    pub current_index: usize,
    pub total_cards: usize,
    pub card: Option<Flashcard>,
    pub flipped: bool,
    pub phase: CarouselPhase,
    pub translating: bool,
    pub language: Option<String>,
    pub pagination: Vec<PageItem>,
}

struct Deck {
    carousel: Carousel,
    original: Vec<Flashcard>,
    /// Translated cards, when a language is selected.
    translated: Option<(String, Vec<Flashcard>)>,
    sync: StateSync<FlashcardsToolState>,
}

impl Deck {
    fn cards(&self) -> &[Flashcard] {
        match &self.translated {
            Some((_, cards)) => cards,
            None => &self.original,
        }
    }

    fn view(&self) -> FlashcardsView {
        let index = self.carousel.index();
        FlashcardsView {
            current_index: index,
            total_cards: self.carousel.len(),
            card: self.cards().get(index).cloned(),
            flipped: self.carousel.is_flipped(),
            phase: self.carousel.phase(),
            translating: self.carousel.is_translating(),
            language: self.translated.as_ref().map(|(lang, _)| lang.clone()),
            pagination: paginate(self.carousel.len(), index + 1, DEFAULT_SIBLING_COUNT),
        }
    }
}

/// Flashcard carousel. Animation phases run on a background task, so the
/// deck lives behind a lock shared with that task.
pub struct FlashcardsTool {
    deck: Arc<Mutex<Deck>>,
    assistant: Arc<dyn StudyAssistant>,
    slide: Duration,
}

impl FlashcardsTool {
    pub async fn mount(
        store: Arc<dyn ToolStateStore>,
        assistant: Arc<dyn StudyAssistant>,
        user_id: Uuid,
        session_id: Uuid,
        cards: Vec<Flashcard>,
        timings: ToolTimings,
    ) -> Self {
        let key = ToolKey::new(user_id, session_id, ToolKind::Flashcards);
        let mut sync: StateSync<FlashcardsToolState> = StateSync::new(
            store,
            key,
            SavePolicy::for_tool(ToolKind::Flashcards, timings.debounce),
        );
        let mut carousel = Carousel::new(cards.len());

        if cards.is_empty() {
            sync.mark_loaded();
        } else if let Some(saved) = sync.load().await {
            if !carousel.restore(saved.current_index) {
                debug!(target: "studydeck::tools", "Ignoring saved index {} for {}", saved.current_index, key);
            }
        }

        Self {
            deck: Arc::new(Mutex::new(Deck {
                carousel,
                original: cards,
                translated: None,
                sync,
            })),
            assistant,
            slide: timings.slide,
        }
    }

    fn deck(&self) -> MutexGuard<'_, Deck> {
        lock(&self.deck)
    }

    pub fn view(&self) -> FlashcardsView {
        self.deck().view()
    }

    /// Start a slide to another card. The returned view shows the slide-out
    /// phase; the index changes once it completes.
    pub fn navigate(&self, request: NavRequest) -> Result<FlashcardsView> {
        let mut deck = self.deck();
        let transition = deck
            .carousel
            .request(request)
            .map_err(|e| StudyError::transition(ToolKind::Flashcards, e))?;

        if let Some(transition) = transition {
            debug!(
                target: "studydeck::tools",
                "Card {} -> {} ({:?})",
                transition.from,
                transition.to,
                transition.direction
            );
            deck.sync.set_suppressed(true);
            tokio::spawn(run_slide(self.deck.clone(), self.slide));
        }

        Ok(deck.view())
    }

    pub fn flip(&self) -> Result<FlashcardsView> {
        let mut deck = self.deck();
        deck.carousel
            .flip()
            .map_err(|e| StudyError::transition(ToolKind::Flashcards, e))?;
        Ok(deck.view())
    }

    /// Show the deck in `language`. An empty language restores the original cards.
    pub async fn translate(&self, language: &str) -> Result<FlashcardsView> {
        let language = language.trim();
        let original = {
            let mut deck = self.deck();
            if language.is_empty() {
                deck.translated = None;
                return Ok(deck.view());
            }
            if deck.carousel.is_translating() {
                return Err(StudyError::transition(
                    ToolKind::Flashcards,
                    "a translation is already running",
                ));
            }
            deck.carousel.set_translating(true);
            deck.original.clone()
        };

        let result = self
            .assistant
            .translate_flashcards(&original, language)
            .await
            .and_then(|cards| {
                if cards.len() == original.len() {
                    Ok(cards)
                } else {
                    warn!(
                        target: "studydeck::tools",
                        "Translation returned {} cards for a deck of {}",
                        cards.len(),
                        original.len()
                    );
                    Err(StudyError::Ai("Failed to translate flashcards.".into()))
                }
            });

        let mut deck = self.deck();
        deck.carousel.set_translating(false);
        match result {
            Ok(cards) => {
                deck.translated = Some((language.to_string(), cards));
                Ok(deck.view())
            }
            Err(e) => {
                deck.translated = None;
                Err(e)
            }
        }
    }
}

fn lock(deck: &Mutex<Deck>) -> MutexGuard<'_, Deck> {
    deck.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drive both animation phases, then save the settled index.
async fn run_slide(deck: Arc<Mutex<Deck>>, slide: Duration) {
    tokio::time::sleep(slide).await;
    lock(&deck).carousel.finish_slide_out();

    tokio::time::sleep(slide).await;
    let mut deck = lock(&deck);
    deck.carousel.finish_slide_in();
    deck.sync.set_suppressed(false);
    let state = FlashcardsToolState {
        current_index: deck.carousel.index(),
    };
    deck.sync.save(&state);
}

// ============================================================================
// Tutor
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TutorView {
    pub messages: Vec<Message>,
}

pub struct TutorTool {
    study_material: String,
    messages: Vec<Message>,
    assistant: Arc<dyn StudyAssistant>,
    sync: StateSync<TutorToolState>,
}

impl TutorTool {
    pub async fn mount(
        store: Arc<dyn ToolStateStore>,
        assistant: Arc<dyn StudyAssistant>,
        user_id: Uuid,
        session_id: Uuid,
        study_material: String,
    ) -> Self {
        let key = ToolKey::new(user_id, session_id, ToolKind::Tutor);
        let mut sync = StateSync::new(store, key, SavePolicy::Immediate);

        let messages = match sync.load().await {
            Some(TutorToolState { messages }) => messages,
            None => vec![Message::ai(TUTOR_GREETING)],
        };

        Self {
            study_material,
            messages,
            assistant,
            sync,
        }
    }

    pub fn view(&self) -> TutorView {
        TutorView {
            messages: self.messages.clone(),
        }
    }

    /// Ask the tutor a question. AI failures become an apology in the
    /// conversation rather than an error.
    pub async fn send(&mut self, text: &str) -> Result<TutorView> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StudyError::Validation("Message cannot be empty".into()));
        }

        let history = self.messages.clone();
        self.push(Message::user(text));

        let reply = match self
            .assistant
            .chat_reply(&self.study_material, &history, text)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(target: "studydeck::tools", "Tutor reply failed for {}: {}", self.sync.key(), e);
                TUTOR_ERROR_REPLY.to_string()
            }
        };
        self.push(Message::ai(reply));

        Ok(self.view())
    }

    fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.sync.save(&TutorToolState {
            messages: self.messages.clone(),
        });
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeAssistant;
    use super::*;
    use crate::sync::testing::{RecordingStore, StoreCall};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn question(correct: &str) -> QuizQuestion {
        QuizQuestion {
            question: format!("Which is {}?", correct),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: correct.into(),
        }
    }

    fn cards(n: usize) -> Vec<Flashcard> {
        (0..n)
            .map(|i| Flashcard {
                question: format!("q{}", i),
                answer: format!("a{}", i),
            })
            .collect()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(2000)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiz_resumes_and_saves_progress() {
        let store = Arc::new(RecordingStore::default());
        let (user, session) = (Uuid::new_v4(), Uuid::new_v4());
        store.put(
            ToolKey::new(user, session, ToolKind::Quiz),
            json!({"currentQuestionIndex": 1, "selectedAnswers": {"0": "A"}}),
        );

        let questions = vec![question("A"), question("B"), question("C")];
        let mut tool = QuizTool::mount(store.clone(), user, session, questions, ToolTimings::default()).await;
        let view = tool.view();
        assert_eq!(view.current_question_index, 1);
        assert_eq!(view.selected_answers.get(&0).map(String::as_str), Some("A"));
        assert!(!view.can_advance);

        tool.select_answer(1, "B").unwrap();
        tool.next().unwrap();
        settle().await;

        assert_eq!(
            store.saves(),
            vec![json!({"currentQuestionIndex": 2, "selectedAnswers": {"0": "A", "1": "B"}})]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiz_submit_clears_state() {
        let store = Arc::new(RecordingStore::default());
        let questions = vec![question("A"), question("B")];
        let mut tool = QuizTool::mount(
            store.clone(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            questions,
            ToolTimings::default(),
        )
        .await;

        assert!(tool.submit_with(|_| async { Ok(()) }).await.is_err());
        tool.select_answer(0, "A").unwrap();
        tool.select_answer(1, "C").unwrap();
        let result = tool.submit_with(|_| async { Ok(()) }).await.unwrap();
        assert_eq!((result.score, result.total), (1, 2));
        assert_eq!(tool.view().score, Some(1));
        settle().await;

        // The pending save was cancelled by the clear
        assert_eq!(store.calls(), vec![StoreCall::Load, StoreCall::Clear]);

        let view = tool.restart();
        assert_eq!(view.status, QuizStatus::InProgress);
        assert!(view.selected_answers.is_empty());
        settle().await;
        assert_eq!(store.calls().last(), Some(&StoreCall::Clear));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiz_stays_open_when_result_is_not_recorded() {
        let store = Arc::new(RecordingStore::default());
        let mut tool = QuizTool::mount(
            store.clone(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![question("A"), question("B")],
            ToolTimings::default(),
        )
        .await;
        tool.select_answer(0, "A").unwrap();
        tool.select_answer(1, "B").unwrap();
        settle().await;

        let failed = tool
            .submit_with(|_| async { Err(StudyError::Validation("history unavailable".into())) })
            .await;
        assert!(matches!(failed, Err(StudyError::Validation(_))));
        let view = tool.view();
        assert_eq!(view.status, QuizStatus::InProgress);
        assert_eq!(view.selected_answers.len(), 2);
        assert!(view.score.is_none());
        settle().await;
        assert!(!store.calls().contains(&StoreCall::Clear));

        let recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = recorded.clone();
        let result = tool
            .submit_with(|result| async move {
                sink.lock().unwrap().push(result);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!((result.score, result.total), (2, 2));
        assert_eq!(recorded.lock().unwrap().as_slice(), &[result]);
        assert_eq!(tool.view().status, QuizStatus::Submitted);
        settle().await;
        assert_eq!(store.calls().last(), Some(&StoreCall::Clear));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiz_next_without_answer_is_rejected() {
        let store = Arc::new(RecordingStore::default());
        let mut tool = QuizTool::mount(
            store,
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![question("A"), question("B")],
            ToolTimings::default(),
        )
        .await;

        assert!(matches!(
            tool.next(),
            Err(StudyError::InvalidTransition { tool: ToolKind::Quiz, .. })
        ));
        assert_eq!(tool.view().current_question_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flashcards_slide_and_save_settled_index() {
        let store = Arc::new(RecordingStore::default());
        let tool = FlashcardsTool::mount(
            store.clone(),
            Arc::new(FakeAssistant::default()),
            Uuid::new_v4(),
            Uuid::new_v4(),
            cards(5),
            ToolTimings::default(),
        )
        .await;

        let view = tool.navigate(NavRequest::Prev).unwrap();
        assert_eq!(view.current_index, 0);
        assert!(matches!(view.phase, CarouselPhase::SlidingOut(_)));

        // Dropped while animating
        assert!(tool.navigate(NavRequest::Next).is_err());

        tokio::time::sleep(Duration::from_millis(350)).await;
        let view = tool.view();
        assert_eq!(view.current_index, 4);
        assert!(matches!(view.phase, CarouselPhase::SlidingIn(_)));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(tool.view().phase, CarouselPhase::Idle);
        assert_eq!(tool.view().card.unwrap().question, "q4");

        settle().await;
        assert_eq!(store.saves(), vec![json!({"currentIndex": 4})]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flashcards_restore_ignores_out_of_range() {
        let store = Arc::new(RecordingStore::default());
        let (user, session) = (Uuid::new_v4(), Uuid::new_v4());
        let key = ToolKey::new(user, session, ToolKind::Flashcards);

        store.put(key, json!({"currentIndex": 9}));
        let tool = FlashcardsTool::mount(
            store.clone(),
            Arc::new(FakeAssistant::default()),
            user,
            session,
            cards(3),
            ToolTimings::default(),
        )
        .await;
        assert_eq!(tool.view().current_index, 0);

        store.put(key, json!({"currentIndex": 2}));
        let tool = FlashcardsTool::mount(
            store.clone(),
            Arc::new(FakeAssistant::default()),
            user,
            session,
            cards(3),
            ToolTimings::default(),
        )
        .await;
        assert_eq!(tool.view().current_index, 2);
        assert_eq!(tool.view().pagination.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_deck_skips_load() {
        let store = Arc::new(RecordingStore::default());
        let tool = FlashcardsTool::mount(
            store.clone(),
            Arc::new(FakeAssistant::default()),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Vec::new(),
            ToolTimings::default(),
        )
        .await;

        assert!(store.calls().is_empty());
        assert!(tool.view().card.is_none());
        assert!(tool.navigate(NavRequest::Next).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flashcards_translate_and_restore() {
        let store = Arc::new(RecordingStore::default());
        let assistant = Arc::new(FakeAssistant::default());
        let tool = FlashcardsTool::mount(
            store,
            assistant.clone(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            cards(2),
            ToolTimings::default(),
        )
        .await;

        let view = tool.translate("es").await.unwrap();
        assert_eq!(view.language.as_deref(), Some("es"));
        assert_eq!(view.card.unwrap().question, "es:q0");
        assert!(!view.translating);

        let view = tool.translate("").await.unwrap();
        assert_eq!(view.language, None);
        assert_eq!(view.card.unwrap().question, "q0");

        tool.translate("fr").await.unwrap();
        assistant.fail.store(true, Ordering::SeqCst);
        assert!(matches!(tool.translate("de").await, Err(StudyError::Ai(_))));
        let view = tool.view();
        assert_eq!(view.language, None);
        assert_eq!(view.card.unwrap().question, "q0");
        assert!(tool.navigate(NavRequest::Next).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flip_resets_on_navigation() {
        let store = Arc::new(RecordingStore::default());
        let tool = FlashcardsTool::mount(
            store,
            Arc::new(FakeAssistant::default()),
            Uuid::new_v4(),
            Uuid::new_v4(),
            cards(3),
            ToolTimings::default(),
        )
        .await;

        assert!(tool.flip().unwrap().flipped);
        assert!(!tool.navigate(NavRequest::Jump(2)).unwrap().flipped);
        assert!(tool.flip().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tutor_greets_and_saves_immediately() {
        let store = Arc::new(RecordingStore::default());
        let mut tool = TutorTool::mount(
            store.clone(),
            Arc::new(FakeAssistant::default()),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Mitochondria".into(),
        )
        .await;

        assert_eq!(tool.view().messages, vec![Message::ai(TUTOR_GREETING)]);
        assert!(tool.send("   ").await.is_err());

        let view = tool.send("What is ATP?").await.unwrap();
        assert_eq!(view.messages.len(), 3);
        assert_eq!(view.messages[2], Message::ai("[1] What is ATP?"));

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let saves = store.saves();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[1]["messages"].as_array().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tutor_failure_appends_apology() {
        let store = Arc::new(RecordingStore::default());
        let (user, session) = (Uuid::new_v4(), Uuid::new_v4());
        store.put(
            ToolKey::new(user, session, ToolKind::Tutor),
            json!({"messages": [{"sender": "user", "text": "hi"}, {"sender": "ai", "text": "hello"}]}),
        );

        let mut tool = TutorTool::mount(
            store,
            Arc::new(FakeAssistant::failing()),
            user,
            session,
            "Cells".into(),
        )
        .await;
        assert_eq!(tool.view().messages.len(), 2);

        let view = tool.send("Explain osmosis").await.unwrap();
        assert_eq!(view.messages.last(), Some(&Message::ai(TUTOR_ERROR_REPLY)));
    }
}
