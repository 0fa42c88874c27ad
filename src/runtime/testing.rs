//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::ConversationStore;
use crate::conversation::ConversationHistory;
use crate::llm::{
    ChunkCallback, Completion, CompletionClient, CompletionRequest, GenerationParams, LlmError,
    STOP_MARKER,
};
use crate::prompts::{technical_fallback_prompt, PromptLoader};
use crate::state_machine::ConversationState;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Completion Client
// ============================================================================

enum Scripted {
    /// Streams each chunk, then finishes
    Reply(Vec<String>),
    /// Streams some text, then fails
    PartialError(String, LlmError),
    Error(LlmError),
    /// Streams some text, then waits for cancellation
    UntilCancelled(String),
}

#[derive(Default)]
struct MockInner {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

/// Mock completion client that plays back queued outcomes.
///
/// Clones share the same queue and request log.
#[derive(Clone)]
pub struct MockCompletionClient {
    inner: Arc<MockInner>,
    model_id: String,
}

impl MockCompletionClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MockInner::default()),
            model_id: model_id.into(),
        }
    }

    fn push(&self, step: Scripted) {
        self.inner.script.lock().unwrap().push_back(step);
    }

    /// Queue a successful response delivered as one chunk
    pub fn queue_response(&self, text: impl Into<String>) {
        self.push(Scripted::Reply(vec![text.into()]));
    }

    /// Queue a successful response delivered over several chunks
    pub fn queue_stream(&self, chunks: &[&str]) {
        self.push(Scripted::Reply(
            chunks.iter().map(ToString::to_string).collect(),
        ));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.push(Scripted::Error(error));
    }

    /// Queue a stream that emits `text` and then fails
    pub fn queue_partial_error(&self, text: impl Into<String>, error: LlmError) {
        self.push(Scripted::PartialError(text.into(), error));
    }

    /// Queue a stream that emits `text` and then hangs until cancelled
    pub fn queue_until_cancelled(&self, text: impl Into<String>) {
        self.push(Scripted::UntilCancelled(text.into()));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.inner.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<Completion, LlmError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        let step = self.inner.script.lock().unwrap().pop_front();

        match step {
            Some(Scripted::Reply(chunks)) => {
                let mut text = String::new();
                for chunk in chunks {
                    text.push_str(&chunk);
                    on_chunk(&text);
                }
                Ok(Completion::finished(text))
            }
            Some(Scripted::PartialError(text, error)) => {
                on_chunk(&text);
                Err(error)
            }
            Some(Scripted::Error(error)) => Err(error),
            Some(Scripted::UntilCancelled(text)) => {
                if !text.is_empty() {
                    on_chunk(&text);
                }
                cancel.cancelled().await;
                Ok(Completion::stopped(format!("{text}\n{STOP_MARKER}")))
            }
            None => Err(LlmError::network("No mock response queued")),
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Static Prompt Loader
// ============================================================================

/// Prompt loader backed by a fixed map; counts specialist loads
pub struct StaticPromptLoader {
    routing: String,
    technical: HashMap<String, String>,
    technical_loads: Mutex<Vec<String>>,
}

impl StaticPromptLoader {
    pub fn new(routing: impl Into<String>) -> Self {
        Self {
            routing: routing.into(),
            technical: HashMap::new(),
            technical_loads: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_technical(mut self, technology: &str, prompt: &str) -> Self {
        self.technical
            .insert(technology.to_string(), prompt.to_string());
        self
    }

    /// Technologies requested so far, in order
    pub fn technical_loads(&self) -> Vec<String> {
        self.technical_loads.lock().unwrap().clone()
    }
}

#[async_trait]
impl PromptLoader for StaticPromptLoader {
    async fn routing_prompt(&self) -> String {
        self.routing.clone()
    }

    async fn technical_prompt(&self, technology: &str) -> String {
        self.technical_loads
            .lock()
            .unwrap()
            .push(technology.to_string());
        self.technical
            .get(technology)
            .cloned()
            .unwrap_or_else(|| technical_fallback_prompt(technology))
    }
}

// ============================================================================
// In-memory Storage
// ============================================================================

/// In-memory storage for testing
#[derive(Default)]
pub struct InMemoryStorage {
    history: Mutex<ConversationHistory>,
    state: Mutex<ConversationState>,
    settings: Mutex<Option<GenerationParams>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> ConversationHistory {
        self.history.lock().unwrap().clone()
    }

    pub fn state(&self) -> ConversationState {
        self.state.lock().unwrap().clone()
    }

    pub fn settings(&self) -> Option<GenerationParams> {
        *self.settings.lock().unwrap()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStorage {
    async fn save_history(&self, history: &ConversationHistory) -> Result<(), String> {
        *self.history.lock().unwrap() =
            ConversationHistory::from_messages(history.persisted_window().to_vec());
        Ok(())
    }

    async fn save_state(&self, state: &ConversationState) -> Result<(), String> {
        *self.state.lock().unwrap() = state.clone();
        Ok(())
    }

    async fn save_settings(&self, settings: &GenerationParams) -> Result<(), String> {
        *self.settings.lock().unwrap() = Some(*settings);
        Ok(())
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

use crate::runtime::{start, ConversationHandle, DispatchError, RuntimeSetup, SseEvent};
use crate::state_machine::Event;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast;

pub const TEST_ROUTING_PROMPT: &str = "You route IT questions.";

/// Helper for building test runtimes with minimal boilerplate
pub struct TestRuntime {
    pub handle: ConversationHandle,
    pub storage: Arc<InMemoryStorage>,
    pub llm: MockCompletionClient,
    pub prompts: Arc<StaticPromptLoader>,
    pub broadcast_rx: broadcast::Receiver<SseEvent>,
}

pub struct TestRuntimeBuilder {
    llm: MockCompletionClient,
    prompts: StaticPromptLoader,
    setup: RuntimeSetup,
}

impl TestRuntime {
    pub fn builder() -> TestRuntimeBuilder {
        TestRuntimeBuilder {
            llm: MockCompletionClient::new("test-model"),
            prompts: StaticPromptLoader::new(TEST_ROUTING_PROMPT),
            setup: RuntimeSetup {
                routing_prompt: TEST_ROUTING_PROMPT.to_string(),
                model_id: "test-model".to_string(),
                ..RuntimeSetup::default()
            },
        }
    }
}

impl TestRuntimeBuilder {
    #[must_use]
    pub fn llm(mut self, llm: MockCompletionClient) -> Self {
        self.llm = llm;
        self
    }

    #[must_use]
    pub fn prompts(mut self, prompts: StaticPromptLoader) -> Self {
        self.prompts = prompts;
        self
    }

    #[must_use]
    pub fn resume_from(mut self, state: ConversationState, history: ConversationHistory) -> Self {
        self.setup.state = state;
        self.setup.history = history;
        self
    }

    /// Must be called from within a tokio runtime
    pub fn build(self) -> TestRuntime {
        let storage = Arc::new(InMemoryStorage::new());
        let prompts = Arc::new(self.prompts);
        let handle = start(
            self.setup,
            storage.clone(),
            Arc::new(self.llm.clone()),
            prompts.clone(),
        );
        let broadcast_rx = handle.subscribe();
        TestRuntime {
            handle,
            storage,
            llm: self.llm,
            prompts,
            broadcast_rx,
        }
    }
}

impl TestRuntime {
    /// Send a user message for turn `turn_id`
    pub async fn send_message(&self, turn_id: &str, text: &str) -> Result<(), DispatchError> {
        self.handle
            .dispatch(Event::UserMessage {
                turn_id: turn_id.to_string(),
                text: text.to_string(),
            })
            .await
    }

    pub async fn send_cancel(&self) -> Result<(), DispatchError> {
        self.handle.dispatch(Event::Cancel).await
    }

    /// Wait for the next `turn_done` notification and return its payload
    pub async fn wait_for_turn_done(&mut self) -> Option<Value> {
        let wait = async {
            loop {
                match self.broadcast_rx.recv().await {
                    Ok(SseEvent::TurnDone { data }) => return Some(data),
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(2), wait)
            .await
            .ok()
            .flatten()
    }

    /// Collect every event broadcast until the next `turn_done`
    pub async fn events_until_turn_done(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        let collect = async {
            while let Ok(event) = self.broadcast_rx.recv().await {
                let done = matches!(event, SseEvent::TurnDone { .. });
                events.push(event);
                if done {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(Duration::from_secs(2), collect).await;
        events
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Message, Role, GREETING};
    use crate::state_machine::{Phase, TransitionError};

    const EXO_PROMPT: &str = "You are an Exchange Online specialist.";

    fn exchange_runtime() -> TestRuntime {
        TestRuntime::builder()
            .prompts(
                StaticPromptLoader::new(TEST_ROUTING_PROMPT)
                    .with_technical("ExchangeOnline", EXO_PROMPT),
            )
            .build()
    }

    fn contents(request: &CompletionRequest) -> Vec<(Role, &str)> {
        request
            .messages
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_mock_client_plays_back_queue() {
        let mock = MockCompletionClient::new("m");
        mock.queue_stream(&["Hel", "lo"]);
        let seen = Mutex::new(Vec::new());
        let on_chunk = |t: &str| seen.lock().unwrap().push(t.to_string());
        let request = CompletionRequest {
            model: "m".into(),
            messages: vec![],
            params: GenerationParams::default(),
        };

        let first = mock
            .complete(&request, &CancellationToken::new(), &on_chunk)
            .await
            .unwrap();
        assert_eq!(first, Completion::finished("Hello"));
        assert_eq!(*seen.lock().unwrap(), vec!["Hel", "Hello"]);

        // Nothing left to play back
        let second = mock
            .complete(&request, &CancellationToken::new(), &on_chunk)
            .await;
        assert!(second.is_err());
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    /// Outlook question routed to Exchange Online and answered by the specialist
    #[tokio::test]
    async fn test_routing_then_handoff() {
        let mut rt = exchange_runtime();
        rt.llm
            .queue_response("[TECH_IDENTIFIED: ExchangeOnline] Mailbox sync issue.");
        rt.llm.queue_response("1. Check the OST file.");

        rt.send_message("t1", "My Outlook won't sync").await.unwrap();
        let done = rt.wait_for_turn_done().await.unwrap();
        assert_eq!(done["message_id"], "msg-t1-tech");
        assert_eq!(done["stopped"], false);

        let requests = rt.llm.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            contents(&requests[0]),
            vec![
                (Role::System, TEST_ROUTING_PROMPT),
                (Role::User, "My Outlook won't sync"),
            ]
        );
        assert_eq!(
            contents(&requests[1]),
            vec![
                (
                    Role::System,
                    "You are an Exchange Online specialist.\n\nContext from routing agent: Mailbox sync issue."
                ),
                (Role::User, "My Outlook won't sync"),
            ]
        );

        let snapshot = rt.handle.snapshot().await;
        assert_eq!(snapshot.phase, Phase::TechnicalResponse);
        assert_eq!(snapshot.technology.as_deref(), Some("ExchangeOnline"));
        assert!(!snapshot.busy);
        let ids: Vec<_> = snapshot
            .messages
            .iter()
            .map(|m| m.id.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(ids, vec!["msg-t1-user", "msg-t1-router", "msg-t1-tech"]);

        let stored = rt.storage.state();
        assert_eq!(stored.phase, Phase::TechnicalResponse);
        assert!(stored.original_user_query.is_none());
        assert_eq!(rt.storage.history().len(), 3);
    }

    #[tokio::test]
    async fn test_follow_up_goes_straight_to_specialist() {
        let mut rt = exchange_runtime();
        rt.llm
            .queue_response("[TECH_IDENTIFIED: ExchangeOnline] Mailbox sync issue.");
        rt.llm.queue_response("1. Check the OST file.");
        rt.llm.queue_response("2. Recreate the profile.");

        rt.send_message("t1", "My Outlook won't sync").await.unwrap();
        rt.wait_for_turn_done().await.unwrap();
        rt.send_message("t2", "it still fails").await.unwrap();
        let done = rt.wait_for_turn_done().await.unwrap();
        assert_eq!(done["message_id"], "msg-t2-tech");

        let requests = rt.llm.recorded_requests();
        assert_eq!(requests.len(), 3, "no second routing call");
        assert_eq!(
            contents(&requests[2])[1..],
            [
                (Role::User, "it still fails"),
                (Role::Assistant, "1. Check the OST file."),
                (Role::User, "it still fails"),
            ]
        );
        // Prompt reloaded for every specialist call
        assert_eq!(
            rt.prompts.technical_loads(),
            vec!["ExchangeOnline", "ExchangeOnline"]
        );
    }

    #[tokio::test]
    async fn test_scoping_question_stays_in_routing() {
        let mut rt = exchange_runtime();
        rt.llm.queue_response("[SCOPING_QUESTION] Which application?");

        rt.send_message("t1", "Something is broken").await.unwrap();
        let done = rt.wait_for_turn_done().await.unwrap();
        assert_eq!(done["message_id"], "msg-t1-router");

        let snapshot = rt.handle.snapshot().await;
        assert_eq!(snapshot.phase, Phase::Routing);
        assert!(snapshot.technology.is_none());
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(rt.llm.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_routing_failure_stores_error_and_resets() {
        let mut rt = exchange_runtime();
        rt.llm
            .queue_error(LlmError::from_status(500, "API error: upstream down"));

        rt.send_message("t1", "My Outlook won't sync").await.unwrap();
        let events = rt.events_until_turn_done().await;
        assert!(events.iter().any(|e| matches!(
            e,
            SseEvent::Error { data } if data["message"] == "API error: upstream down"
        )));

        let snapshot = rt.handle.snapshot().await;
        assert_eq!(snapshot.phase, Phase::Routing);
        let last = snapshot.messages.last().unwrap();
        assert!(last.is_error);
        assert_eq!(last.content, "Error: API error: upstream down");
        assert_eq!(rt.storage.state(), ConversationState::default());
    }

    #[tokio::test]
    async fn test_empty_technical_response_is_fatal() {
        let mut rt = exchange_runtime();
        rt.llm
            .queue_response("[TECH_IDENTIFIED: ExchangeOnline] Mailbox sync issue.");
        rt.llm.queue_response("   ");

        rt.send_message("t1", "My Outlook won't sync").await.unwrap();
        rt.wait_for_turn_done().await.unwrap();

        let snapshot = rt.handle.snapshot().await;
        assert_eq!(snapshot.phase, Phase::Routing);
        assert!(snapshot.technology.is_none());
        assert_eq!(
            snapshot.messages.last().unwrap().content,
            "Error: Empty response received from API"
        );
    }

    #[tokio::test]
    async fn test_cancel_stores_nothing() {
        let mut rt = exchange_runtime();
        rt.llm.queue_until_cancelled("Let me th");

        rt.send_message("t1", "My Outlook won't sync").await.unwrap();
        rt.send_cancel().await.unwrap();
        let done = rt.wait_for_turn_done().await.unwrap();

        assert_eq!(done["stopped"], true);
        assert!(done["text"].as_str().unwrap().ends_with(STOP_MARKER));

        let snapshot = rt.handle.snapshot().await;
        assert!(!snapshot.busy);
        assert_eq!(snapshot.phase, Phase::Routing);
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_busy_rejects_second_message() {
        let mut rt = exchange_runtime();
        rt.llm.queue_until_cancelled("");

        rt.send_message("t1", "first").await.unwrap();
        let err = rt.send_message("t2", "second").await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Rejected(TransitionError::AgentBusy)
        ));

        rt.send_cancel().await.unwrap();
        rt.wait_for_turn_done().await.unwrap();
        rt.llm.queue_response("[SCOPING_QUESTION] Which app?");
        rt.send_message("t3", "third").await.unwrap();
        rt.wait_for_turn_done().await.unwrap();
        assert_eq!(rt.llm.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_regenerate_replaces_reply() {
        let mut rt = exchange_runtime();
        rt.llm.queue_response("[SCOPING_QUESTION] Which application?");
        rt.llm.queue_response("[SCOPING_QUESTION] Desktop or web?");

        rt.send_message("t1", "Mail is broken").await.unwrap();
        rt.wait_for_turn_done().await.unwrap();
        rt.handle
            .dispatch(Event::Regenerate {
                message_id: "msg-t1-router".into(),
                turn_id: "t2".into(),
            })
            .await
            .unwrap();
        rt.wait_for_turn_done().await.unwrap();

        let snapshot = rt.handle.snapshot().await;
        let ids: Vec<_> = snapshot
            .messages
            .iter()
            .map(|m| m.id.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(ids, vec!["msg-t1-user", "msg-t2-router"]);
        assert_eq!(
            contents(&rt.llm.recorded_requests()[1]),
            vec![
                (Role::System, TEST_ROUTING_PROMPT),
                (Role::User, "Mail is broken"),
            ]
        );
    }

    #[tokio::test]
    async fn test_new_conversation_shows_greeting() {
        let rt = TestRuntime::builder()
            .resume_from(
                ConversationState {
                    phase: Phase::TechnicalResponse,
                    identified_technology: Some("Teams".into()),
                    ..ConversationState::default()
                },
                ConversationHistory::from_messages(vec![Message::user("u", "old")]),
            )
            .build();

        rt.handle
            .dispatch(Event::NewConversation {
                greeting_id: "greeting-1".into(),
            })
            .await
            .unwrap();

        let snapshot = rt.handle.snapshot().await;
        assert_eq!(snapshot.phase, Phase::Routing);
        assert_eq!(snapshot.messages.len(), 1);
        assert!(snapshot.messages[0].is_greeting);
        assert_eq!(snapshot.messages[0].content, GREETING);
    }

    #[tokio::test]
    async fn test_resumed_specialist_skips_routing() {
        let mut rt = TestRuntime::builder()
            .resume_from(
                ConversationState {
                    phase: Phase::TechnicalResponse,
                    identified_technology: Some("Teams".into()),
                    ..ConversationState::default()
                },
                ConversationHistory::new(),
            )
            .build();
        rt.llm.queue_response("Restart the client.");

        rt.send_message("t1", "calls drop").await.unwrap();
        rt.wait_for_turn_done().await.unwrap();

        let requests = rt.llm.recorded_requests();
        assert_eq!(requests.len(), 1);
        // No prompt on file for Teams
        assert_eq!(requests[0].messages[0].content, technical_fallback_prompt("Teams"));
    }

    #[tokio::test]
    async fn test_long_specialist_session_keeps_handoff_context() {
        let mut messages = vec![
            Message::user("msg-u0-user", "Teams keeps freezing"),
            Message::assistant("msg-u0-router", "[TECH_IDENTIFIED: Teams] Client issue."),
        ];
        for i in 1..50 {
            messages.push(Message::user(format!("msg-q{i}-user"), format!("q{i}")));
            messages.push(Message::assistant(format!("msg-q{i}-tech"), format!("a{i}")));
        }
        assert_eq!(messages.len(), crate::conversation::HISTORY_LIMIT);

        let mut rt = TestRuntime::builder()
            .resume_from(
                ConversationState {
                    phase: Phase::TechnicalResponse,
                    identified_technology: Some("Teams".into()),
                    ..ConversationState::default()
                },
                ConversationHistory::from_messages(messages),
            )
            .build();
        rt.llm.queue_response("first answer");
        rt.llm.queue_response("second answer");

        rt.send_message("f1", "follow1").await.unwrap();
        rt.wait_for_turn_done().await.unwrap();
        rt.send_message("f2", "follow2").await.unwrap();
        rt.wait_for_turn_done().await.unwrap();

        let requests = rt.llm.recorded_requests();
        let second: Vec<&str> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
        assert!(second.len() > 90, "specialist context lost: {second:?}");
        assert!(second.contains(&"a1"));
        assert!(second.contains(&"first answer"));
        assert_eq!(second.last(), Some(&"follow2"));

        // Only the stored copy is windowed
        let snapshot = rt.handle.snapshot().await;
        assert_eq!(snapshot.messages.len(), crate::conversation::HISTORY_LIMIT + 4);
        assert!(snapshot.messages[1].has_id("msg-u0-router"));
        assert_eq!(rt.storage.history().len(), crate::conversation::HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn test_chunks_are_running_snapshots() {
        let mut rt = exchange_runtime();
        rt.llm.queue_stream(&["[SCOPING_", "QUESTION] Which", " app?"]);

        rt.send_message("t1", "help").await.unwrap();
        let chunks: Vec<String> = rt
            .events_until_turn_done()
            .await
            .into_iter()
            .filter_map(|e| match e {
                SseEvent::Chunk { message_id, text } if message_id == "msg-t1-router" => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(
            chunks,
            vec!["[SCOPING_", "[SCOPING_QUESTION] Which", "[SCOPING_QUESTION] Which app?"]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported() {
        let mut rt = exchange_runtime();
        rt.llm
            .queue_partial_error("[SCOPING", LlmError::network("Error reading stream: reset"));

        rt.send_message("t1", "help").await.unwrap();
        rt.wait_for_turn_done().await.unwrap();

        let snapshot = rt.handle.snapshot().await;
        assert_eq!(
            snapshot.messages.last().unwrap().content,
            "Error: Error reading stream: reset"
        );
    }

    #[tokio::test]
    async fn test_update_settings_clamps_and_persists() {
        let rt = exchange_runtime();
        let stored = rt
            .handle
            .update_settings(GenerationParams {
                temperature: 0.3,
                max_tokens: 20_000,
                top_p: 0.5,
            })
            .await
            .unwrap();

        assert_eq!(stored.max_tokens, crate::llm::MAX_TOKENS_CEILING);
        assert_eq!(rt.handle.settings().await, stored);
        assert_eq!(rt.storage.settings(), Some(stored));
    }

    #[tokio::test]
    async fn test_settings_reach_requests() {
        let mut rt = exchange_runtime();
        let params = GenerationParams {
            temperature: 0.1,
            max_tokens: 300,
            top_p: 0.8,
        };
        rt.handle.update_settings(params).await.unwrap();
        rt.llm.queue_response("[SCOPING_QUESTION] Which?");

        rt.send_message("t1", "help").await.unwrap();
        rt.wait_for_turn_done().await.unwrap();

        assert_eq!(rt.llm.recorded_requests()[0].params, params);
        assert_eq!(rt.llm.recorded_requests()[0].model, "test-model");
    }
}
