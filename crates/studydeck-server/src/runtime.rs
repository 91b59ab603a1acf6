//! Mounted tool instances.
//!
//! A tool is mounted the first time a user opens it for a session. It stays
//! mounted until it is reopened, the user signs out, or it goes unused for
//! longer than the idle limit. Progress is saved as it happens, so an
//! unmounted tool simply resumes from the store on next open.
//!
//! Each instance is locked while an interaction runs, so interactions on one
//! tool never interleave.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use studydeck_core::{FlashcardsTool, QuizTool, TutorTool};
use studydeck_types::AuthEvent;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// (user, session)
type SlotKey = (Uuid, Uuid);

struct Slot<T> {
    tool: T,
    last_used: Instant,
}

/// One kind of mounted tool, with last-use times.
struct Slots<T> {
    map: DashMap<SlotKey, Slot<T>>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            map: DashMap::new(),
        }
    }
}

impl<T: Clone> Slots<T> {
    /// Look up a tool and mark it used.
    fn get(&self, key: SlotKey) -> Option<T> {
        self.map.get_mut(&key).map(|mut slot| {
            slot.last_used = Instant::now();
            slot.tool.clone()
        })
    }

    fn insert(&self, key: SlotKey, tool: T) -> T {
        self.map.insert(
            key,
            Slot {
                tool: tool.clone(),
                last_used: Instant::now(),
            },
        );
        tool
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn retain(&self, keep: impl Fn(&SlotKey, Instant) -> bool) {
        self.map.retain(|key, slot| keep(key, slot.last_used));
    }
}

#[derive(Default)]
pub struct ToolRuntime {
    quizzes: Slots<Arc<Mutex<QuizTool>>>,
    flashcards: Slots<Arc<FlashcardsTool>>,
    tutors: Slots<Arc<Mutex<TutorTool>>>,
}

impl ToolRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quiz(&self, user_id: Uuid, session_id: Uuid) -> Option<Arc<Mutex<QuizTool>>> {
        self.quizzes.get((user_id, session_id))
    }

    pub fn insert_quiz(&self, user_id: Uuid, session_id: Uuid, tool: QuizTool) -> Arc<Mutex<QuizTool>> {
        self.quizzes
            .insert((user_id, session_id), Arc::new(Mutex::new(tool)))
    }

    pub fn flashcards(&self, user_id: Uuid, session_id: Uuid) -> Option<Arc<FlashcardsTool>> {
        self.flashcards.get((user_id, session_id))
    }

    pub fn insert_flashcards(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        tool: FlashcardsTool,
    ) -> Arc<FlashcardsTool> {
        self.flashcards.insert((user_id, session_id), Arc::new(tool))
    }

    pub fn tutor(&self, user_id: Uuid, session_id: Uuid) -> Option<Arc<Mutex<TutorTool>>> {
        self.tutors.get((user_id, session_id))
    }

    pub fn insert_tutor(&self, user_id: Uuid, session_id: Uuid, tool: TutorTool) -> Arc<Mutex<TutorTool>> {
        self.tutors
            .insert((user_id, session_id), Arc::new(Mutex::new(tool)))
    }

    /// Number of mounted tools across all users.
    pub fn mounted_count(&self) -> usize {
        self.quizzes.len() + self.flashcards.len() + self.tutors.len()
    }

    fn retain(&self, keep: impl Fn(&SlotKey, Instant) -> bool) -> usize {
        let before = self.mounted_count();
        self.quizzes.retain(&keep);
        self.flashcards.retain(&keep);
        self.tutors.retain(&keep);
        before - self.mounted_count()
    }

    /// Unmount every tool belonging to a user. Returns how many were removed.
    pub fn evict_user(&self, user_id: Uuid) -> usize {
        self.retain(|(user, _), _| *user != user_id)
    }

    /// Unmount tools unused for at least `max_idle`. Returns how many were removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        self.retain(|_, last_used| now.duration_since(last_used) < max_idle)
    }

    /// Unmount a user's tools whenever they sign out.
    pub fn spawn_auth_listener(self: Arc<Self>, mut events: broadcast::Receiver<AuthEvent>) {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::SignedOut { user_id }) => {
                        let evicted = self.evict_user(user_id);
                        info!(target: "studydeck::tools", "Unmounted {} tools for user {}", evicted, user_id);
                    }
                    Ok(AuthEvent::SignedIn { user_id }) => {
                        debug!(target: "studydeck::tools", "User {} signed in", user_id);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: "studydeck::tools", "Auth listener skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Periodically unmount idle tools. Stops once the runtime is dropped.
    pub fn spawn_idle_sweeper(self: &Arc<Self>, max_idle: Duration, every: Duration) {
        let runtime = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(runtime) = runtime.upgrade() else {
                    break;
                };
                let evicted = runtime.evict_idle(max_idle);
                if evicted > 0 {
                    info!(
                        target: "studydeck::tools",
                        "Unmounted {} idle tools ({} still mounted)",
                        evicted,
                        runtime.mounted_count()
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studydeck_core::{StudyStore, ToolStateStore, ToolTimings};

    async fn mount_quiz(runtime: &ToolRuntime, store: &Arc<dyn ToolStateStore>, user: Uuid, session: Uuid) {
        let quiz = QuizTool::mount(store.clone(), user, session, Vec::new(), ToolTimings::default()).await;
        runtime.insert_quiz(user, session, quiz);
    }

    #[tokio::test]
    async fn test_evict_user_only_removes_their_tools() {
        let store: Arc<dyn ToolStateStore> = Arc::new(StudyStore::open_in_memory().unwrap());
        let runtime = ToolRuntime::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        for user in [alice, bob] {
            mount_quiz(&runtime, &store, user, Uuid::new_v4()).await;
        }
        assert_eq!(runtime.mounted_count(), 2);

        assert_eq!(runtime.evict_user(alice), 1);
        assert_eq!(runtime.mounted_count(), 1);
        assert_eq!(runtime.evict_user(alice), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_keeps_recently_used_tools() {
        let store: Arc<dyn ToolStateStore> = Arc::new(StudyStore::open_in_memory().unwrap());
        let runtime = ToolRuntime::new();
        let user = Uuid::new_v4();
        let (used, unused) = (Uuid::new_v4(), Uuid::new_v4());
        mount_quiz(&runtime, &store, user, used).await;
        mount_quiz(&runtime, &store, user, unused).await;

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        assert!(runtime.quiz(user, used).is_some());
        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        assert_eq!(runtime.evict_idle(Duration::from_secs(30 * 60)), 1);
        assert!(runtime.quiz(user, used).is_some());
        assert!(runtime.quiz(user, unused).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_unmounts_abandoned_sessions() {
        let store: Arc<dyn ToolStateStore> = Arc::new(StudyStore::open_in_memory().unwrap());
        let runtime = Arc::new(ToolRuntime::new());
        let user = Uuid::new_v4();
        let mut sessions = Vec::new();
        for _ in 0..40 {
            let session = Uuid::new_v4();
            mount_quiz(&runtime, &store, user, session).await;
            sessions.push(session);
        }
        assert_eq!(runtime.mounted_count(), 40);

        runtime.spawn_idle_sweeper(Duration::from_secs(600), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(runtime.quiz(user, sessions[0]).is_some());

        tokio::time::sleep(Duration::from_secs(400)).await;
        assert_eq!(runtime.mounted_count(), 1);

        tokio::time::sleep(Duration::from_secs(700)).await;
        assert_eq!(runtime.mounted_count(), 0);
    }
}
