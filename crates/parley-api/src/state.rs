//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use parley_chat::ChatOrchestrator;
use parley_core::ParleyConfig;
use parley_storage::ConversationStore;

use crate::auth::SessionTable;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ParleyConfig>,
    pub store: Arc<dyn ConversationStore>,
    pub chat: Arc<ChatOrchestrator>,
    /// Bearer token to user mapping.
    pub sessions: Arc<SessionTable>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: ParleyConfig,
        store: Arc<dyn ConversationStore>,
        chat: ChatOrchestrator,
        sessions: SessionTable,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            chat: Arc::new(chat),
            sessions: Arc::new(sessions),
            start_time: Instant::now(),
        }
    }

    /// Model assigned to new conversations that do not name one.
    pub fn default_model(&self) -> String {
        self.config.default_model()
    }
}
