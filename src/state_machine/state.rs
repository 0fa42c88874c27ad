//! Conversation state types

use serde::{Deserialize, Serialize};

/// Where the conversation is in the routing/specialist cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Classifying the next user request
    #[default]
    Routing,
    /// A technology was identified; the first specialist call is in flight
    TechnicalHandoff,
    /// The specialist answered; follow-ups go straight to it
    TechnicalResponse,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Routing => "routing",
            Phase::TechnicalHandoff => "technical_handoff",
            Phase::TechnicalResponse => "technical_response",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which agent an in-flight request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Routing,
    Technical,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::Routing => f.write_str("routing"),
            RequestKind::Technical => f.write_str("technical request"),
        }
    }
}

/// The single outstanding completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub kind: RequestKind,
    /// Turn that started the request; reply ids derive from it
    pub turn_id: String,
    /// Id the reply will be stored under
    pub reply_id: String,
    /// Set once the user asked to stop
    pub cancelling: bool,
}

impl PendingRequest {
    pub fn new(kind: RequestKind, turn_id: &str, reply_id: String) -> Self {
        Self {
            kind,
            turn_id: turn_id.to_string(),
            reply_id,
            cancelling: false,
        }
    }
}

/// Conversation-level state, mutated only through `transition`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub phase: Phase,
    pub identified_technology: Option<String>,
    /// The query being answered; cleared once a specialist consumed it
    pub original_user_query: Option<String>,
    /// Routing explanation carried into the specialist's system prompt
    pub routing_context: Option<String>,
    /// In-flight request; never persisted
    #[serde(skip)]
    pub pending: Option<PendingRequest>,
}

impl ConversationState {
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_cancelling(&self) -> bool {
        self.pending.as_ref().is_some_and(|p| p.cancelling)
    }

    /// Pending request if its reply id matches
    pub fn pending_for(&self, reply_id: &str) -> Option<&PendingRequest> {
        self.pending.as_ref().filter(|p| p.reply_id == reply_id)
    }

    /// State as restored after a restart: nothing can be in flight, and a
    /// handoff that never completed starts over at routing
    #[must_use]
    pub fn restored(self) -> Self {
        if self.phase == Phase::TechnicalHandoff {
            tracing::info!("Resetting interrupted handoff to routing");
            return Self::default();
        }
        Self {
            pending: None,
            ..self
        }
    }
}
