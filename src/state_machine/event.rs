//! Events that can occur in a conversation

use super::state::RequestKind;
use crate::llm::{LlmError, LlmErrorKind};
use thiserror::Error;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserMessage {
        turn_id: String,
        text: String,
    },
    /// Re-run routing from the message before `message_id`
    Regenerate {
        message_id: String,
        turn_id: String,
    },
    Clear,
    NewConversation {
        greeting_id: String,
    },
    Cancel,

    // Request outcomes, keyed by the reply id of the pending request
    RoutingResponse {
        reply_id: String,
        text: String,
    },
    TechnicalResponse {
        reply_id: String,
        text: String,
    },
    RequestStopped {
        reply_id: String,
        text: String,
    },
    RequestFailed {
        reply_id: String,
        error: TurnError,
    },
}

impl Event {
    /// Events originating from the user, as opposed to request outcomes
    pub fn is_user_event(&self) -> bool {
        matches!(
            self,
            Event::UserMessage { .. }
                | Event::Regenerate { .. }
                | Event::Clear
                | Event::NewConversation { .. }
                | Event::Cancel
        )
    }
}

/// Why a turn ended without a usable reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("Failed to format messages for {0}.")]
    FormattingFailure(RequestKind),
    #[error("{0}")]
    ProtocolViolation(String),
    #[error("{0}")]
    RequestFailed(String),
    #[error("Empty response received from API")]
    EmptyResponse,
}

impl From<LlmError> for TurnError {
    fn from(error: LlmError) -> Self {
        match error.kind {
            LlmErrorKind::ProtocolViolation => TurnError::ProtocolViolation(error.message),
            _ => TurnError::RequestFailed(error.message),
        }
    }
}
