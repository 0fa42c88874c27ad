//! Effects produced by state transitions

use super::state::ConversationState;
use crate::conversation::Message;
use serde_json::{json, Value};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a message to history, persist it and publish it
    PersistMessage { message: Message },

    /// Remove a message and everything after it from history
    TruncateHistory { from_id: String },

    /// Empty the history
    ClearHistory,

    /// Persist the new state
    PersistState,

    /// Start a routing request whose reply is stored as `reply_id`
    RequestRouting { reply_id: String },

    /// Start a specialist request whose reply is stored as `reply_id`
    RequestTechnical { reply_id: String },

    /// Abort the in-flight request
    AbortRequest,

    /// Notify connected clients
    NotifyClient { event_type: String, data: Value },
}

impl Effect {
    pub fn persist(message: Message) -> Self {
        Effect::PersistMessage { message }
    }

    pub fn notify_state_change(state: &ConversationState) -> Self {
        Effect::NotifyClient {
            event_type: "state_change".to_string(),
            data: json!({
                "phase": state.phase,
                "technology": state.identified_technology,
                "busy": state.is_busy(),
            }),
        }
    }

    /// The turn finished with a stored reply
    pub fn notify_turn_done(reply_id: &str) -> Self {
        Effect::NotifyClient {
            event_type: "turn_done".to_string(),
            data: json!({ "message_id": reply_id, "stopped": false }),
        }
    }

    /// The turn was stopped; `text` is the partial reply, which is not stored
    pub fn notify_turn_stopped(reply_id: &str, text: &str) -> Self {
        Effect::NotifyClient {
            event_type: "turn_done".to_string(),
            data: json!({ "message_id": reply_id, "stopped": true, "text": text }),
        }
    }

    pub fn notify_error(reply_id: &str, message: &str) -> Self {
        Effect::NotifyClient {
            event_type: "error".to_string(),
            data: json!({ "message_id": reply_id, "message": message }),
        }
    }
}
