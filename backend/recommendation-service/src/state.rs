use std::sync::Arc;

use document_store::DocumentStore;

use crate::config::SuggestionLimits;
use crate::services::{EventSuggestionEngine, FriendSuggestionEngine};

/// Long-lived application context
///
/// Built once at startup and shared via `Arc` by the HTTP handlers and the
/// suggestion sweeper.
pub struct AppContext {
    pub store: Arc<dyn DocumentStore>,
    pub friends: FriendSuggestionEngine,
    pub events: EventSuggestionEngine,
}

impl AppContext {
    pub fn new(store: Arc<dyn DocumentStore>, limits: SuggestionLimits) -> Self {
        Self {
            friends: FriendSuggestionEngine::new(store.clone(), limits),
            events: EventSuggestionEngine::new(store.clone(), limits),
            store,
        }
    }
}
