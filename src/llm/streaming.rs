//! Streaming chat-completion client for `OpenAI`-compatible endpoints

use super::models::wire_name;
use super::sse::{SseDecoder, SseFrame};
use super::types::{ChatMessage, Completion, CompletionRequest, Role};
use super::validator::{first_turn_role, requests_prefix_continuation, validate_sequence};
use super::{ChunkCallback, CompletionClient, LlmError, STOP_MARKER};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_ENDPOINT: &str = "https://api.deepseek.com/v1/chat/completions";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Streaming client bound to one endpoint and model
pub struct StreamingClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model_id: String,
}

impl StreamingClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model_id: model_id.into(),
        })
    }

    fn build_body(request: &CompletionRequest) -> Result<ChatRequestBody<'_>, LlmError> {
        if request.messages.is_empty() {
            return Err(LlmError::invalid_request("No messages to send to API"));
        }

        let messages = validate_sequence(&request.messages);
        if first_turn_role(&messages).is_some_and(|role| role != Role::User) {
            return Err(LlmError::protocol_violation(
                "First non-system message must be from user",
            ));
        }

        let params = request.params.sanitized();
        Ok(ChatRequestBody {
            model: wire_name(&request.model),
            prefix_mode: requests_prefix_continuation(&messages),
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
            stream: true,
        })
    }
}

#[async_trait]
impl CompletionClient for StreamingClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<Completion, LlmError> {
        let body = Self::build_body(request)?;

        let send = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send();

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("Request cancelled before response");
                return Ok(Completion::stopped(STOP_MARKER));
            }
            result = send => result.map_err(classify_transport_error)?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        read_event_stream(response.bytes_stream(), cancel, on_chunk).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
    prefix_mode: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: serde_json::Value,
}

// ============================================================================
// Response handling
// ============================================================================

fn classify_transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::network(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        LlmError::network(format!("Connection failed: {e}"))
    } else {
        LlmError::unknown(format!("Request failed: {e}"))
    }
}

async fn error_from_response(response: Response) -> LlmError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    let detail = error_detail(status, &body);
    let error = LlmError::from_status(status.as_u16(), format!("API error: {detail}"));
    match retry_after {
        Some(after) => error.with_retry_after(after),
        None => error,
    }
}

/// Extract a human-readable message from an error body
fn error_detail(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error {
            serde_json::Value::String(message) => message,
            serde_json::Value::Object(ref fields) => fields
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map_or_else(|| envelope.error.to_string(), str::to_string),
            other => other.to_string(),
        },
        Err(_) => status
            .canonical_reason()
            .map_or_else(|| status.as_u16().to_string(), str::to_string),
    }
}

/// Drain an event-stream body, reporting the accumulated text after every delta.
///
/// Cancellation returns the text received so far followed by the stop marker.
pub(crate) async fn read_event_stream<S, B, E>(
    stream: S,
    cancel: &CancellationToken,
    on_chunk: ChunkCallback<'_>,
) -> Result<Completion, LlmError>
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let mut stream = Box::pin(stream);
    let mut decoder = SseDecoder::new();
    let mut text = String::new();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Ok(stopped_with(text));
            }
            next = stream.next() => match next {
                Some(Ok(bytes)) => {
                    for frame in decoder.push(bytes.as_ref()) {
                        apply_frame(frame, &mut text, on_chunk)?;
                    }
                }
                Some(Err(e)) => {
                    if cancel.is_cancelled() {
                        return Ok(stopped_with(text));
                    }
                    return Err(LlmError::network(format!("Error reading stream: {e}")));
                }
                None => {
                    for frame in decoder.finish() {
                        apply_frame(frame, &mut text, on_chunk)?;
                    }
                    break;
                }
            }
        }
    }

    Ok(Completion::finished(text))
}

fn stopped_with(mut text: String) -> Completion {
    tracing::debug!(chars = text.len(), "Stream cancelled");
    text.push('\n');
    text.push_str(STOP_MARKER);
    Completion::stopped(text)
}

fn apply_frame(
    frame: SseFrame,
    text: &mut String,
    on_chunk: ChunkCallback<'_>,
) -> Result<(), LlmError> {
    match frame {
        SseFrame::Delta(delta) => {
            text.push_str(&delta);
            on_chunk(text);
        }
        // The body still ends on its own; keep reading until it does
        SseFrame::Done => tracing::trace!("Received stream terminator"),
        SseFrame::Error(message) => {
            return Err(LlmError::server_error(format!("Stream error: {message}")));
        }
    }
    Ok(())
}
