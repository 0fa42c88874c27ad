//! Projection of conversation history into provider request lists
//!
//! Two views exist. The routing view replays the whole visible conversation
//! to the classifier. The technical view starts a specialist sub-conversation
//! at the handoff message and drops anything that would break alternation.

use super::parser::handoff_marker;
use crate::conversation::{ConversationHistory, Message, Role};
use crate::llm::ChatMessage;

pub const DEFAULT_ROUTING_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
pub const DEFAULT_TECHNICAL_SYSTEM_PROMPT: &str = "Provide detailed technical steps.";

fn is_excluded(message: &Message, exclude_id: Option<&str>) -> bool {
    exclude_id.is_some_and(|id| message.has_id(id))
}

fn to_chat(message: &Message) -> ChatMessage {
    ChatMessage::new(message.role, message.content.clone())
}

/// Build the request for a routing turn.
///
/// Returns `None` when there is no user content to send at all.
pub fn format_routing_messages(
    routing_prompt: Option<&str>,
    history: &ConversationHistory,
    exclude_id: Option<&str>,
    fallback_query: Option<&str>,
) -> Option<Vec<ChatMessage>> {
    let system = routing_prompt.unwrap_or_else(|| {
        tracing::warn!("Routing prompt missing, using default system prompt");
        DEFAULT_ROUTING_SYSTEM_PROMPT
    });
    let mut messages = vec![ChatMessage::system(system)];

    let last_user = history
        .iter()
        .rev()
        .find(|m| m.role == Role::User && !is_excluded(m, exclude_id));

    let Some(last_user) = last_user else {
        let Some(query) = fallback_query else {
            tracing::error!("No user messages available for routing request");
            return None;
        };
        messages.push(ChatMessage::user(query));
        return Some(messages);
    };

    let mut assistant_seen = false;
    for message in history {
        if is_excluded(message, exclude_id) || message.is_local_only() {
            continue;
        }
        match message.role {
            Role::User => messages.push(to_chat(message)),
            Role::Assistant => {
                messages.push(to_chat(message));
                assistant_seen = true;
            }
            Role::System => {}
        }
    }

    // A fresh routing turn must end on the user, not request continuation
    if assistant_seen && messages.last().is_some_and(|m| m.role == Role::Assistant) {
        messages.pop();
        if !messages.iter().any(|m| m.role == Role::User) {
            messages.push(to_chat(last_user));
        }
    }

    Some(messages)
}

/// Build the request for a specialist turn.
///
/// The original query is always injected as the first user turn, then the
/// history after the handoff message follows. A message whose role repeats
/// the previous one is dropped. Returns `None` without an original query.
pub fn format_technical_messages(
    technical_prompt: Option<&str>,
    original_query: Option<&str>,
    routing_context: Option<&str>,
    history: &ConversationHistory,
    exclude_id: Option<&str>,
    technology: &str,
) -> Option<Vec<ChatMessage>> {
    let system = match technical_prompt {
        Some(prompt) => match routing_context {
            Some(context) => format!("{prompt}\n\nContext from routing agent: {context}"),
            None => prompt.to_string(),
        },
        None => {
            tracing::warn!(technology, "Technical prompt missing, using default");
            DEFAULT_TECHNICAL_SYSTEM_PROMPT.to_string()
        }
    };
    let mut messages = vec![ChatMessage::system(system)];

    let Some(query) = original_query else {
        tracing::error!(technology, "Original query missing for technical request");
        return None;
    };
    messages.push(ChatMessage::user(query));

    let marker = handoff_marker(technology);
    let after_boundary = history
        .iter()
        .skip_while(|m| !(m.role == Role::Assistant && m.content.contains(&marker)))
        .skip(1);

    let mut last_role = Role::User;
    for message in after_boundary {
        if message.role == Role::System
            || message.is_local_only()
            || is_excluded(message, exclude_id)
        {
            continue;
        }
        if message.role == last_role {
            tracing::warn!(
                role = %message.role,
                id = ?message.id,
                "Dropping message that repeats the previous role"
            );
            continue;
        }
        messages.push(to_chat(message));
        last_role = message.role;
    }

    Some(messages)
}
