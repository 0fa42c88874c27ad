//! Pure state transition function
//!
//! Given the same state, history and event this always produces the same
//! result. Ids for new messages derive from the event's turn id.

use super::state::{ConversationState, PendingRequest, Phase, RequestKind};
use super::{Effect, Event, TurnError};
use crate::conversation::{
    router_message_id, tech_message_id, user_message_id, ConversationHistory, Message, Role,
};
use crate::routing::parse_routing_response;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Persist the state and tell clients about it
    #[must_use]
    fn with_state_sync(self) -> Self {
        let notify = Effect::notify_state_change(&self.new_state);
        self.with_effect(Effect::PersistState).with_effect(notify)
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Agent is busy, cannot accept message (cancel current operation first)")]
    AgentBusy,
    #[error("Cancellation in progress")]
    CancellationInProgress,
    #[error("No user message left to regenerate from")]
    NothingToRegenerate,
    #[error("Message {0} not found")]
    MessageNotFound(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Id the reply to a new user message in turn `turn_id` streams under
pub fn message_reply_id(phase: Phase, technology: Option<&str>, turn_id: &str) -> String {
    if phase == Phase::TechnicalResponse && technology.is_some() {
        tech_message_id(turn_id)
    } else {
        router_message_id(turn_id)
    }
}

/// Pure transition function
pub fn transition(
    state: &ConversationState,
    history: &ConversationHistory,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    // Single flight: only Cancel gets through while a request is pending
    if state.is_busy() && event.is_user_event() && !matches!(event, Event::Cancel) {
        return Err(if state.is_cancelling() {
            TransitionError::CancellationInProgress
        } else {
            TransitionError::AgentBusy
        });
    }

    match event {
        // ============================================================
        // User input
        // ============================================================
        Event::UserMessage { turn_id, text } => user_message(state, &turn_id, &text),

        Event::Regenerate {
            message_id,
            turn_id,
        } => regenerate(history, &message_id, &turn_id),

        Event::Clear => Ok(TransitionResult::new(ConversationState::default())
            .with_effect(Effect::ClearHistory)
            .with_state_sync()),

        Event::NewConversation { greeting_id } => {
            Ok(TransitionResult::new(ConversationState::default())
                .with_effect(Effect::ClearHistory)
                .with_effect(Effect::persist(Message::greeting(greeting_id)))
                .with_state_sync())
        }

        Event::Cancel => Ok(cancel(state)),

        // ============================================================
        // Request outcomes
        // ============================================================
        Event::RoutingResponse { reply_id, text } => {
            let pending = expect_pending(state, &reply_id, RequestKind::Routing)?;
            Ok(routing_response(state, pending, &reply_id, text))
        }

        Event::TechnicalResponse { reply_id, text } => {
            expect_pending(state, &reply_id, RequestKind::Technical)?;
            if text.trim().is_empty() {
                return Ok(turn_failed(&reply_id, &TurnError::EmptyResponse));
            }
            let new_state = ConversationState {
                phase: Phase::TechnicalResponse,
                original_user_query: None,
                pending: None,
                ..state.clone()
            };
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::persist(Message::assistant(&reply_id, text)))
                .with_state_sync()
                .with_effect(Effect::notify_turn_done(&reply_id)))
        }

        Event::RequestStopped { reply_id, text } => {
            let kind = state
                .pending_for(&reply_id)
                .map(|p| p.kind)
                .ok_or_else(|| stale_outcome(&reply_id))?;
            Ok(request_stopped(state, kind, &reply_id, &text))
        }

        Event::RequestFailed { reply_id, error } => {
            if state.pending_for(&reply_id).is_none() {
                return Err(stale_outcome(&reply_id));
            }
            Ok(turn_failed(&reply_id, &error))
        }
    }
}

// ============================================================================
// Transition helpers
// ============================================================================

fn user_message(
    state: &ConversationState,
    turn_id: &str,
    text: &str,
) -> Result<TransitionResult, TransitionError> {
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(TransitionError::InvalidTransition(
            "message text is empty".to_string(),
        ));
    }

    let user = Message::user(user_message_id(turn_id), text.clone());
    let reply_id = message_reply_id(
        state.phase,
        state.identified_technology.as_deref(),
        turn_id,
    );

    // Follow-up to the active specialist: no second routing call
    if let (Phase::TechnicalResponse, Some(technology)) =
        (state.phase, state.identified_technology.as_ref())
    {
        let new_state = ConversationState {
            phase: Phase::TechnicalResponse,
            identified_technology: Some(technology.clone()),
            original_user_query: Some(text),
            routing_context: state.routing_context.clone(),
            pending: Some(PendingRequest::new(
                RequestKind::Technical,
                turn_id,
                reply_id.clone(),
            )),
        };
        return Ok(TransitionResult::new(new_state)
            .with_effect(Effect::persist(user))
            .with_state_sync()
            .with_effect(Effect::RequestTechnical { reply_id }));
    }

    let new_state = ConversationState {
        phase: Phase::Routing,
        identified_technology: None,
        original_user_query: Some(text),
        routing_context: None,
        pending: Some(PendingRequest::new(
            RequestKind::Routing,
            turn_id,
            reply_id.clone(),
        )),
    };
    Ok(TransitionResult::new(new_state)
        .with_effect(Effect::persist(user))
        .with_state_sync()
        .with_effect(Effect::RequestRouting { reply_id }))
}

fn regenerate(
    history: &ConversationHistory,
    message_id: &str,
    turn_id: &str,
) -> Result<TransitionResult, TransitionError> {
    let index = history
        .position(message_id)
        .ok_or_else(|| TransitionError::MessageNotFound(message_id.to_string()))?;
    let target = &history.messages()[index];
    if target.role != Role::Assistant {
        return Err(TransitionError::InvalidTransition(
            "only assistant messages can be regenerated".to_string(),
        ));
    }

    // Regenerate always re-classifies from the last remaining user message
    let query = history.messages()[..index]
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.clone())
        .ok_or(TransitionError::NothingToRegenerate)?;

    let reply_id = router_message_id(turn_id);
    let new_state = ConversationState {
        phase: Phase::Routing,
        identified_technology: None,
        original_user_query: Some(query),
        routing_context: None,
        pending: Some(PendingRequest::new(
            RequestKind::Routing,
            turn_id,
            reply_id.clone(),
        )),
    };
    Ok(TransitionResult::new(new_state)
        .with_effect(Effect::TruncateHistory {
            from_id: message_id.to_string(),
        })
        .with_state_sync()
        .with_effect(Effect::RequestRouting { reply_id }))
}

fn cancel(state: &ConversationState) -> TransitionResult {
    match &state.pending {
        Some(pending) if !pending.cancelling => {
            let new_state = ConversationState {
                pending: Some(PendingRequest {
                    cancelling: true,
                    ..pending.clone()
                }),
                ..state.clone()
            };
            TransitionResult::new(new_state).with_effect(Effect::AbortRequest)
        }
        // Nothing in flight, or already stopping
        _ => TransitionResult::new(state.clone()),
    }
}

fn routing_response(
    state: &ConversationState,
    pending: &PendingRequest,
    reply_id: &str,
    text: String,
) -> TransitionResult {
    let decision = parse_routing_response(&text);
    // The raw reply is stored: it carries the handoff marker
    let reply = Message::assistant(reply_id, text);

    if let Some(technology) = decision.technology() {
        let tech_reply_id = tech_message_id(&pending.turn_id);
        let new_state = ConversationState {
            phase: Phase::TechnicalHandoff,
            identified_technology: Some(technology.to_string()),
            original_user_query: state.original_user_query.clone(),
            routing_context: Some(decision.explanation.clone()),
            pending: Some(PendingRequest::new(
                RequestKind::Technical,
                &pending.turn_id,
                tech_reply_id.clone(),
            )),
        };
        return TransitionResult::new(new_state)
            .with_effect(Effect::persist(reply))
            .with_state_sync()
            .with_effect(Effect::RequestTechnical {
                reply_id: tech_reply_id,
            });
    }

    let new_state = ConversationState {
        phase: Phase::Routing,
        identified_technology: None,
        original_user_query: state.original_user_query.clone(),
        routing_context: None,
        pending: None,
    };
    TransitionResult::new(new_state)
        .with_effect(Effect::persist(reply))
        .with_state_sync()
        .with_effect(Effect::notify_turn_done(reply_id))
}

/// Cancellation stores nothing; the partial text only goes to clients
fn request_stopped(
    state: &ConversationState,
    kind: RequestKind,
    reply_id: &str,
    text: &str,
) -> TransitionResult {
    let new_state = match kind {
        RequestKind::Routing => ConversationState {
            phase: Phase::Routing,
            identified_technology: None,
            routing_context: None,
            pending: None,
            ..state.clone()
        },
        RequestKind::Technical => ConversationState {
            phase: Phase::TechnicalResponse,
            original_user_query: None,
            pending: None,
            ..state.clone()
        },
    };
    TransitionResult::new(new_state)
        .with_state_sync()
        .with_effect(Effect::notify_turn_stopped(reply_id, text))
}

/// Fatal turn outcome: one error message, full reset
fn turn_failed(reply_id: &str, error: &TurnError) -> TransitionResult {
    let message = error.to_string();
    TransitionResult::new(ConversationState::default())
        .with_effect(Effect::persist(Message::error(reply_id, &message)))
        .with_state_sync()
        .with_effect(Effect::notify_error(reply_id, &message))
        .with_effect(Effect::notify_turn_done(reply_id))
}

fn expect_pending<'a>(
    state: &'a ConversationState,
    reply_id: &str,
    kind: RequestKind,
) -> Result<&'a PendingRequest, TransitionError> {
    match state.pending_for(reply_id) {
        Some(pending) if pending.kind == kind => Ok(pending),
        Some(pending) => Err(TransitionError::InvalidTransition(format!(
            "{kind} outcome for a pending {} request",
            pending.kind
        ))),
        None => Err(stale_outcome(reply_id)),
    }
}

fn stale_outcome(reply_id: &str) -> TransitionError {
    TransitionError::InvalidTransition(format!("no pending request for {reply_id}"))
}
