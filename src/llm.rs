//! Chat-completion client abstraction
//!
//! One streaming transport, wrapped by logging and retry decorators.

mod error;
mod models;
mod retry;
mod sse;
mod streaming;
mod types;
pub mod validator;


pub use error::{LlmError, LlmErrorKind};
pub use models::{all_models, find_model, DEFAULT_MODEL};
pub use retry::{RetryPolicy, RetryingClient};
pub use streaming::{StreamingClient, DEFAULT_ENDPOINT};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Appended to the partial text when generation is cancelled
pub const STOP_MARKER: &str = "*(Generation stopped)*";

/// Receives the full accumulated text after every streamed delta
pub type ChunkCallback<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Common interface for completion backends
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Stream a completion. Cancellation is not an error: it yields a
    /// `Completion` with `stopped` set and the stop marker appended.
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<Completion, LlmError>;

    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for Arc<T> {
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<Completion, LlmError> {
        (**self).complete(request, cancel, on_chunk).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Logging wrapper for completion clients
pub struct LoggingClient {
    inner: Arc<dyn CompletionClient>,
    model_id: String,
}

impl LoggingClient {
    pub fn new(inner: Arc<dyn CompletionClient>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl CompletionClient for LoggingClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<Completion, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request, cancel, on_chunk).await;
        let duration = start.elapsed();

        match &result {
            Ok(completion) => {
                tracing::info!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    chars = completion.text.len(),
                    stopped = completion.stopped,
                    "Completion request finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    status = ?e.status,
                    retryable = e.kind.is_retryable(),
                    "Completion request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
