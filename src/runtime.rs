//! Runtime for executing the conversation
//!
//! A single `ConversationRuntime` task owns the state and history. Callers
//! talk to it through a cloneable `ConversationHandle`: events go in over an
//! mpsc channel, updates come out over a broadcast channel.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;
pub use traits::*;

use crate::conversation::{ConversationHistory, Message};
use crate::llm::{CompletionClient, GenerationParams};
use crate::prompts::PromptLoader;
use crate::state_machine::{ConversationState, Event, Phase, TransitionError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    /// Full picture; also re-sent after history is truncated or cleared
    Init { snapshot: ConversationSnapshot },
    Message { message: Message },
    /// Running snapshot of a reply while it streams
    Chunk { message_id: String, text: String },
    StateChange { data: Value },
    TurnDone { data: Value },
    Error { data: Value },
}

/// Read-only view of the conversation for the API
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    pub phase: Phase,
    pub technology: Option<String>,
    pub estimated_tokens: u64,
    pub busy: bool,
}

/// Messages accepted by the runtime loop
#[derive(Debug)]
pub(crate) enum Command {
    /// An event, with an optional channel for the transition verdict
    Event {
        event: Event,
        reply: Option<oneshot::Sender<Result<(), TransitionError>>>,
    },
    UpdateSettings {
        settings: GenerationParams,
        reply: oneshot::Sender<GenerationParams>,
    },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Conversation runtime is not running")]
    Closed,
}

/// Everything the runtime resumes from
#[derive(Debug, Clone, Default)]
pub struct RuntimeSetup {
    pub state: ConversationState,
    pub history: ConversationHistory,
    /// Loaded once at start-up and kept for the process lifetime
    pub routing_prompt: String,
    pub model_id: String,
    pub settings: GenerationParams,
}

/// Handle to interact with the running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    snapshot: Arc<RwLock<ConversationSnapshot>>,
    settings: Arc<RwLock<GenerationParams>>,
}

impl ConversationHandle {
    /// Send a user event and wait for the state machine to accept or reject it
    pub async fn dispatch(&self, event: Event) -> Result<(), DispatchError> {
        let (reply, verdict) = oneshot::channel();
        self.command_tx
            .send(Command::Event {
                event,
                reply: Some(reply),
            })
            .await
            .map_err(|_| DispatchError::Closed)?;
        verdict.await.map_err(|_| DispatchError::Closed)??;
        Ok(())
    }

    /// Subscribe to conversation updates
    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.broadcast_tx.subscribe()
    }

    pub async fn snapshot(&self) -> ConversationSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn settings(&self) -> GenerationParams {
        *self.settings.read().await
    }

    /// Replace the generation settings; returns them as stored (clamped)
    pub async fn update_settings(
        &self,
        settings: GenerationParams,
    ) -> Result<GenerationParams, DispatchError> {
        let (reply, stored) = oneshot::channel();
        self.command_tx
            .send(Command::UpdateSettings { settings, reply })
            .await
            .map_err(|_| DispatchError::Closed)?;
        stored.await.map_err(|_| DispatchError::Closed)
    }
}

/// Start the runtime in the background and return a handle to it
pub fn start<S: ConversationStore + 'static>(
    setup: RuntimeSetup,
    storage: S,
    client: Arc<dyn CompletionClient>,
    prompts: Arc<dyn PromptLoader>,
) -> ConversationHandle {
    let (command_tx, command_rx) = mpsc::channel(32);
    let (broadcast_tx, _) = broadcast::channel(256);
    let snapshot = Arc::new(RwLock::new(ConversationSnapshot::default()));
    let settings = Arc::new(RwLock::new(setup.settings));

    let runtime = ConversationRuntime::new(
        setup,
        storage,
        client,
        prompts,
        executor::Channels {
            command_rx,
            command_tx: command_tx.clone(),
            broadcast_tx: broadcast_tx.clone(),
        },
        snapshot.clone(),
        settings.clone(),
    );

    tokio::spawn(async move {
        runtime.run().await;
        tracing::info!("Conversation runtime finished");
    });

    ConversationHandle {
        command_tx,
        broadcast_tx,
        snapshot,
        settings,
    }
}
