//! Message sequence normalization for the chat-completion contract
//!
//! The provider rejects payloads whose first non-system turn is not `user`
//! or whose user/assistant turns do not strictly alternate. Rather than fail,
//! violations are repaired by inserting short filler turns.

use super::types::{ChatMessage, Role};

/// Inserted when the conversation would otherwise open on an assistant turn
pub const OPENING_USER_FILLER: &str = "Please assist me with this context.";
/// Inserted between two consecutive assistant turns
pub const CONTINUE_USER_FILLER: &str = "Please continue.";
/// Inserted between two consecutive user turns
pub const ACKNOWLEDGE_ASSISTANT_FILLER: &str = "I understand. Let me assist with that.";

/// Return a copy of `messages` that satisfies the alternation invariant.
///
/// System messages are passed through untouched and do not participate in
/// alternation. An input with no non-system message is returned unchanged.
pub fn validate_sequence(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    if messages.iter().all(|m| m.role == Role::System) {
        return messages.to_vec();
    }

    let mut result = Vec::with_capacity(messages.len() + 2);
    let mut previous: Option<Role> = None;
    let mut repairs = 0usize;

    for message in messages {
        if message.role == Role::System {
            result.push(message.clone());
            continue;
        }

        match previous {
            None if message.role != Role::User => {
                result.push(ChatMessage::user(OPENING_USER_FILLER));
                repairs += 1;
            }
            Some(prev) if prev == message.role => {
                result.push(filler_for(prev.opposite()));
                repairs += 1;
            }
            _ => {}
        }

        result.push(message.clone());
        previous = Some(message.role);
    }

    if repairs > 0 {
        tracing::warn!(
            repairs,
            original_len = messages.len(),
            repaired_len = result.len(),
            "Repaired message sequence for provider contract"
        );
    }

    result
}

fn filler_for(role: Role) -> ChatMessage {
    match role {
        Role::Assistant => ChatMessage::assistant(ACKNOWLEDGE_ASSISTANT_FILLER),
        _ => ChatMessage::user(CONTINUE_USER_FILLER),
    }
}

/// Role of the first non-system message, if any
pub fn first_turn_role(messages: &[ChatMessage]) -> Option<Role> {
    messages
        .iter()
        .map(|m| m.role)
        .find(|role| *role != Role::System)
}

/// True when the sequence asks for prefix continuation of an assistant turn
pub fn requests_prefix_continuation(messages: &[ChatMessage]) -> bool {
    messages.last().is_some_and(|m| m.role == Role::Assistant)
}
