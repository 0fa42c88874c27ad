//! Conversation phase state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! `transition` decides, the runtime executes the resulting effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::{Event, TurnError};
pub use state::{ConversationState, PendingRequest, Phase, RequestKind};
pub use transition::{message_reply_id, transition, TransitionError, TransitionResult};
