//! API request and response types

use crate::conversation::Message;
use crate::state_machine::Phase;
use serde::{Deserialize, Serialize};

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// Request to regenerate an assistant reply
#[derive(Debug, Deserialize)]
pub struct RegenerateRequest {
    pub message_id: String,
}

/// Current conversation, as shown on page load
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub messages: Vec<Message>,
    pub phase: Phase,
    pub technology: Option<String>,
    pub estimated_tokens: u64,
    pub busy: bool,
}

/// Response for chat and regenerate actions
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub queued: bool,
    /// Id the reply will stream under until routing decides otherwise
    pub reply_id: String,
}

/// Response for cancel action
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub ok: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Generation settings as exchanged with the UI
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SettingsBody {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

/// Model information with metadata
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub description: String,
}

/// Response for model list
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
    /// Model this server is configured to use
    pub active: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
