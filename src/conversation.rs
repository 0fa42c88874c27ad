//! Conversation history model
//!
//! History is an ordered, mutable list of messages. Insertion order is
//! significant and ids are unique within one history.

use serde::{Deserialize, Serialize};

pub use crate::llm::Role;

/// Persisted history keeps at most this many messages
pub const HISTORY_LIMIT: usize = 100;

/// Text of the assistant greeting that opens a new conversation
pub const GREETING: &str = "Hello! I'm Agent 01, your AI assistant. How can I help you today?";

/// A message in the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Greeting messages are shown to the user but never sent upstream
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_greeting: bool,
    /// Error placeholders are shown to the user but never sent upstream
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde skip_serializing_if signature
fn is_false(value: &bool) -> bool {
    !*value
}

impl Message {
    pub fn new(role: Role, id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            id: Some(id.into()),
            is_greeting: false,
            is_error: false,
        }
    }

    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::User, id, content)
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, id, content)
    }

    pub fn greeting(id: impl Into<String>) -> Self {
        Self {
            is_greeting: true,
            ..Self::assistant(id, GREETING)
        }
    }

    /// Error placeholder, rendered as `Error: <message>`
    pub fn error(id: impl Into<String>, message: &str) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(id, format!("Error: {message}"))
        }
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.id.as_deref() == Some(id)
    }

    /// Greeting and error messages are local-only
    pub fn is_local_only(&self) -> bool {
        self.is_greeting || self.is_error
    }
}

// ============================================================================
// Message ids
// ============================================================================

/// Id of the user message that starts `turn`
pub fn user_message_id(turn: &str) -> String {
    format!("msg-{turn}-user")
}

/// Id of the routing reply for `turn`
pub fn router_message_id(turn: &str) -> String {
    format!("msg-{turn}-router")
}

/// Id of the specialist reply for `turn`
pub fn tech_message_id(turn: &str) -> String {
    format!("msg-{turn}-tech")
}

// ============================================================================
// History
// ============================================================================

/// Chronologically ordered conversation history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.has_id(id))
    }

    /// Remove the message with `id` and everything after it; returns how many
    /// messages were removed (zero when the id is unknown)
    pub fn truncate_from(&mut self, id: &str) -> usize {
        match self.position(id) {
            Some(index) => {
                let removed = self.messages.len() - index;
                self.messages.truncate(index);
                removed
            }
            None => 0,
        }
    }

    /// The most recent messages that get written to storage; the live
    /// history itself is never trimmed
    pub fn persisted_window(&self) -> &[Message] {
        let start = self.messages.len().saturating_sub(HISTORY_LIMIT);
        &self.messages[start..]
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// Rough token estimate for the status display: 1.3 tokens per
/// whitespace-separated word over the routing prompt and non-error turns
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn estimate_tokens(routing_prompt: Option<&str>, history: &ConversationHistory) -> u64 {
    let prompt_words = routing_prompt.map_or(0, |p| p.split_whitespace().count());
    let history_words: usize = history
        .iter()
        .filter(|m| m.role != Role::System && !m.is_error)
        .map(|m| m.content.split_whitespace().count())
        .sum();

    ((prompt_words + history_words) as f64 * 1.3).round() as u64
}
