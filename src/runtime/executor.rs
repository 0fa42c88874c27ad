//! Conversation runtime executor

use super::traits::ConversationStore;
use super::{Command, ConversationSnapshot, RuntimeSetup, SseEvent};

use crate::conversation::{estimate_tokens, ConversationHistory};
use crate::llm::{ChatMessage, CompletionClient, CompletionRequest, GenerationParams};
use crate::prompts::PromptLoader;
use crate::routing::{format_routing_messages, format_technical_messages};
use crate::state_machine::{
    transition, ConversationState, Effect, Event, RequestKind, TransitionError, TurnError,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Channels wiring the runtime to its handle
pub(super) struct Channels {
    pub command_rx: mpsc::Receiver<Command>,
    pub command_tx: mpsc::Sender<Command>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
}

/// Owns the conversation and executes the effects of every transition
pub struct ConversationRuntime<S>
where
    S: ConversationStore + 'static,
{
    state: ConversationState,
    history: ConversationHistory,
    routing_prompt: String,
    model_id: String,
    storage: S,
    client: Arc<dyn CompletionClient>,
    prompts: Arc<dyn PromptLoader>,
    command_rx: mpsc::Receiver<Command>,
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    snapshot: Arc<RwLock<ConversationSnapshot>>,
    settings: Arc<RwLock<GenerationParams>>,
    /// Token to cancel the running completion request
    cancel_token: Option<CancellationToken>,
}

impl<S> ConversationRuntime<S>
where
    S: ConversationStore + 'static,
{
    pub(super) fn new(
        setup: RuntimeSetup,
        storage: S,
        client: Arc<dyn CompletionClient>,
        prompts: Arc<dyn PromptLoader>,
        channels: Channels,
        snapshot: Arc<RwLock<ConversationSnapshot>>,
        settings: Arc<RwLock<GenerationParams>>,
    ) -> Self {
        Self {
            // Nothing survives a restart in flight
            state: setup.state.restored(),
            history: setup.history,
            routing_prompt: setup.routing_prompt,
            model_id: setup.model_id,
            storage,
            client,
            prompts,
            command_rx: channels.command_rx,
            command_tx: channels.command_tx,
            broadcast_tx: channels.broadcast_tx,
            snapshot,
            settings,
            cancel_token: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            phase = %self.state.phase,
            messages = self.history.len(),
            model = %self.model_id,
            "Starting conversation runtime"
        );
        self.refresh_snapshot().await;

        // Process commands in a loop - no recursion
        while let Some(command) = self.command_rx.recv().await {
            match command {
                Command::Event { event, reply } => {
                    let result = self.process_event(event).await;
                    self.refresh_snapshot().await;
                    match reply {
                        Some(reply) => {
                            let _ = reply.send(result);
                        }
                        None => {
                            if let Err(e) = result {
                                tracing::error!(error = %e, "Error handling request outcome");
                                self.broadcast(SseEvent::Error {
                                    data: serde_json::json!({ "message": e.to_string() }),
                                });
                            }
                        }
                    }
                }
                Command::UpdateSettings { settings, reply } => {
                    let stored = self.update_settings(settings).await;
                    let _ = reply.send(stored);
                }
            }
        }

        tracing::info!("Conversation runtime stopped");
    }

    async fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        // Effects may feed an outcome straight back, so work through a queue
        let mut events_to_process = vec![event];
        let mut first = true;

        while let Some(current_event) = events_to_process.pop() {
            // Pure state transition
            let result = match transition(&self.state, &self.history, current_event) {
                Ok(r) => r,
                Err(e) if first => return Err(e),
                Err(e) => {
                    tracing::error!(error = %e, "Generated event rejected");
                    continue;
                }
            };
            first = false;

            self.state = result.new_state;
            if !self.state.is_busy() {
                self.cancel_token = None;
            }

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events_to_process.push(generated_event);
                }
            }
        }

        Ok(())
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::PersistMessage { message } => {
                self.history.push(message.clone());
                self.save_history().await;
                self.broadcast(SseEvent::Message { message });
                None
            }

            Effect::TruncateHistory { from_id } => {
                let removed = self.history.truncate_from(&from_id);
                tracing::debug!(from_id = %from_id, removed, "Truncated history");
                self.save_history().await;
                self.broadcast_reset();
                None
            }

            Effect::ClearHistory => {
                self.history.clear();
                self.save_history().await;
                self.broadcast_reset();
                None
            }

            Effect::PersistState => {
                if let Err(e) = self.storage.save_state(&self.state).await {
                    tracing::error!(error = %e, "Failed to persist state");
                }
                None
            }

            Effect::RequestRouting { reply_id } => self.request_routing(reply_id),

            Effect::RequestTechnical { reply_id } => self.request_technical(reply_id).await,

            Effect::AbortRequest => {
                if let Some(token) = &self.cancel_token {
                    tracing::info!("Cancelling in-flight request");
                    token.cancel();
                }
                None
            }

            Effect::NotifyClient { event_type, data } => {
                match event_type.as_str() {
                    "state_change" => self.broadcast(SseEvent::StateChange { data }),
                    "turn_done" => self.broadcast(SseEvent::TurnDone { data }),
                    "error" => self.broadcast(SseEvent::Error { data }),
                    other => tracing::warn!(event_type = other, "Unknown client notification"),
                }
                None
            }
        }
    }

    fn request_routing(&mut self, reply_id: String) -> Option<Event> {
        let messages = format_routing_messages(
            Some(&self.routing_prompt),
            &self.history,
            Some(&reply_id),
            self.state.original_user_query.as_deref(),
        );
        let Some(messages) = messages else {
            return Some(Event::RequestFailed {
                reply_id,
                error: TurnError::FormattingFailure(RequestKind::Routing),
            });
        };
        self.spawn_request(RequestKind::Routing, reply_id, messages);
        None
    }

    async fn request_technical(&mut self, reply_id: String) -> Option<Event> {
        let Some(technology) = self.state.identified_technology.clone() else {
            tracing::error!("Technical request without an identified technology");
            return Some(Event::RequestFailed {
                reply_id,
                error: TurnError::FormattingFailure(RequestKind::Technical),
            });
        };

        // Reloaded for every specialist call
        let prompt = self.prompts.technical_prompt(&technology).await;
        let messages = format_technical_messages(
            Some(&prompt),
            self.state.original_user_query.as_deref(),
            self.state.routing_context.as_deref(),
            &self.history,
            Some(&reply_id),
            &technology,
        );
        let Some(messages) = messages else {
            return Some(Event::RequestFailed {
                reply_id,
                error: TurnError::FormattingFailure(RequestKind::Technical),
            });
        };
        self.spawn_request(RequestKind::Technical, reply_id, messages);
        None
    }

    /// Run the completion in the background; its outcome comes back as an event
    fn spawn_request(
        &mut self,
        kind: RequestKind,
        reply_id: String,
        messages: Vec<ChatMessage>,
    ) {
        let cancel_token = CancellationToken::new();
        self.cancel_token = Some(cancel_token.clone());

        let client = self.client.clone();
        let settings = self.settings.clone();
        let model = self.model_id.clone();
        let command_tx = self.command_tx.clone();
        let broadcast_tx = self.broadcast_tx.clone();

        tokio::spawn(async move {
            let request = CompletionRequest {
                model,
                messages,
                params: *settings.read().await,
            };
            tracing::info!(
                kind = %kind,
                reply_id = %reply_id,
                messages = request.messages.len(),
                "Making completion request (background)"
            );

            let chunk_id = reply_id.clone();
            let on_chunk = move |text: &str| {
                let _ = broadcast_tx.send(SseEvent::Chunk {
                    message_id: chunk_id.clone(),
                    text: text.to_string(),
                });
            };

            let event = match client.complete(&request, &cancel_token, &on_chunk).await {
                Ok(completion) if completion.stopped => Event::RequestStopped {
                    reply_id,
                    text: completion.text,
                },
                Ok(completion) => match kind {
                    RequestKind::Routing => Event::RoutingResponse {
                        reply_id,
                        text: completion.text,
                    },
                    RequestKind::Technical => Event::TechnicalResponse {
                        reply_id,
                        text: completion.text,
                    },
                },
                Err(e) => Event::RequestFailed {
                    reply_id,
                    error: e.into(),
                },
            };

            let command = Command::Event { event, reply: None };
            if command_tx.send(command).await.is_err() {
                tracing::warn!("Runtime gone before request outcome was delivered");
            }
        });
    }

    async fn update_settings(&mut self, settings: GenerationParams) -> GenerationParams {
        let settings = settings.sanitized();
        *self.settings.write().await = settings;
        if let Err(e) = self.storage.save_settings(&settings).await {
            tracing::error!(error = %e, "Failed to persist settings");
        }
        tracing::info!(
            temperature = settings.temperature,
            max_tokens = settings.max_tokens,
            top_p = settings.top_p,
            "Updated generation settings"
        );
        settings
    }

    async fn save_history(&self) {
        if let Err(e) = self.storage.save_history(&self.history).await {
            tracing::error!(error = %e, "Failed to persist history");
        }
    }

    fn build_snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            messages: self.history.messages().to_vec(),
            phase: self.state.phase,
            technology: self.state.identified_technology.clone(),
            estimated_tokens: estimate_tokens(Some(&self.routing_prompt), &self.history),
            busy: self.state.is_busy(),
        }
    }

    async fn refresh_snapshot(&self) {
        *self.snapshot.write().await = self.build_snapshot();
    }

    /// History changed in place; clients resync from a fresh snapshot
    fn broadcast_reset(&self) {
        self.broadcast(SseEvent::Init {
            snapshot: self.build_snapshot(),
        });
    }

    fn broadcast(&self, event: SseEvent) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }
}
