//! Shared application state.

use crate::config::Config;
use crate::runtime::ToolRuntime;
use std::sync::Arc;
use studydeck_core::{AuthService, GeminiClient, StudyAssistant, StudyStore, ToolStateStore};
use tracing::warn;

/// Shared application state.
pub struct AppState {
    pub store: Arc<StudyStore>,
    pub auth: Arc<AuthService>,
    pub assistant: Arc<dyn StudyAssistant>,
    pub tools: Arc<ToolRuntime>,
    pub config: Config,
}

impl AppState {
    /// State backed by the Gemini API. Must be called inside a tokio runtime.
    pub fn new(config: Config) -> studydeck_core::Result<Self> {
        let client = GeminiClient::new(config.gemini_config());
        if !client.is_available() {
            warn!(
                target: "studydeck::startup",
                "No Gemini API key configured; generation, tutor and translation will fail"
            );
        }
        Self::with_assistant(config, Arc::new(client))
    }

    /// State with a caller-supplied AI collaborator.
    pub fn with_assistant(
        config: Config,
        assistant: Arc<dyn StudyAssistant>,
    ) -> studydeck_core::Result<Self> {
        let store = Arc::new(StudyStore::open(&config.db_path)?);
        let auth = Arc::new(AuthService::open(&config.db_path)?.with_bcrypt_cost(config.bcrypt_cost));

        let tools = Arc::new(ToolRuntime::new());
        tools.clone().spawn_auth_listener(auth.subscribe());
        tools.spawn_idle_sweeper(config.tool_idle_limit(), config.tool_sweep_interval());

        Ok(Self {
            store,
            auth,
            assistant,
            tools,
            config,
        })
    }

    /// The study store seen through the tool-state seam.
    pub fn tool_store(&self) -> Arc<dyn ToolStateStore> {
        self.store.clone()
    }
}
