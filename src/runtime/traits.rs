//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::conversation::ConversationHistory;
use crate::db::Database;
use crate::llm::GenerationParams;
use crate::state_machine::ConversationState;
use async_trait::async_trait;
use std::sync::Arc;

/// Durable storage for the conversation
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Replace the stored history
    async fn save_history(&self, history: &ConversationHistory) -> Result<(), String>;

    async fn save_state(&self, state: &ConversationState) -> Result<(), String>;

    async fn save_settings(&self, settings: &GenerationParams) -> Result<(), String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn save_history(&self, history: &ConversationHistory) -> Result<(), String> {
        (**self).save_history(history).await
    }

    async fn save_state(&self, state: &ConversationState) -> Result<(), String> {
        (**self).save_state(state).await
    }

    async fn save_settings(&self, settings: &GenerationParams) -> Result<(), String> {
        (**self).save_settings(settings).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationStore for DatabaseStorage {
    async fn save_history(&self, history: &ConversationHistory) -> Result<(), String> {
        self.db.save_history(history).map_err(|e| e.to_string())
    }

    async fn save_state(&self, state: &ConversationState) -> Result<(), String> {
        self.db.save_state(state).map_err(|e| e.to_string())
    }

    async fn save_settings(&self, settings: &GenerationParams) -> Result<(), String> {
        self.db.save_settings(settings).map_err(|e| e.to_string())
    }
}
