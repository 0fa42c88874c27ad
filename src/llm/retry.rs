//! Retry wrapper for completion clients

use super::{ChunkCallback, Completion, CompletionClient, CompletionRequest, LlmError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// When and how often a failed request is retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retriable_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            retriable_status_codes: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Whether `error` qualifies for another attempt under this policy
    pub fn allows(&self, error: &LlmError) -> bool {
        match error.status {
            Some(status) => self.retriable_status_codes.contains(&status),
            None => error.kind.is_retryable(),
        }
    }

    fn delay_for(&self, error: &LlmError) -> Duration {
        error.retry_after.unwrap_or(self.retry_delay)
    }
}

/// Retries failed requests that have not yet emitted any text
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: CompletionClient> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C: CompletionClient> CompletionClient for RetryingClient<C> {
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<Completion, LlmError> {
        let emitted = AtomicBool::new(false);
        let tracking = |text: &str| {
            emitted.store(true, Ordering::Relaxed);
            on_chunk(text);
        };

        let mut attempt = 0u32;
        loop {
            let error = match self.inner.complete(request, cancel, &tracking).await {
                Ok(completion) => return Ok(completion),
                Err(e) => e,
            };

            // A retry would replay text the caller has already seen
            if emitted.load(Ordering::Relaxed)
                || cancel.is_cancelled()
                || attempt >= self.policy.max_retries
                || !self.policy.allows(&error)
            {
                return Err(error);
            }

            attempt += 1;
            let delay = self.policy.delay_for(&error);
            tracing::warn!(
                attempt,
                max_retries = self.policy.max_retries,
                delay_ms = %delay.as_millis(),
                error = %error,
                "Retrying completion request"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(error),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
