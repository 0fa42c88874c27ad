//! HTTP API for the routing assistant

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::runtime::ConversationHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: ConversationHandle,
    /// Model every request is sent to
    pub model_id: String,
}

impl AppState {
    pub fn new(runtime: ConversationHandle, model_id: impl Into<String>) -> Self {
        Self {
            runtime,
            model_id: model_id.into(),
        }
    }
}
