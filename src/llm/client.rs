//! Retrying client over a reasoning service.
//!
//! Each client owns at most one session, opened lazily on the first call
//! and reused afterwards. A failed session opening leaves the client
//! without a session so the next attempt opens a fresh one.

use crate::error::ServiceError;
use crate::llm::{ReasoningService, Session};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Characters of the prompt shown in attempt logs.
const PROMPT_PREVIEW_CHARS: usize = 200;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Retry policy for a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Attempts allowed after the first one.
    pub max_retries: u32,
    /// Wait before the first retry; doubles on each following retry.
    pub initial_retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay: Duration::from_secs(1),
        }
    }
}

impl From<&crate::config::ModelConfig> for ClientConfig {
    fn from(config: &crate::config::ModelConfig) -> Self {
        Self {
            max_retries: config.retries,
            initial_retry_delay: Duration::from_millis(config.initial_retry_delay_ms),
        }
    }
}

impl ClientConfig {
    /// Wait before retry number `retry` (0-based): initial * 2^retry.
    ///
    /// Saturates at `Duration::MAX` once the product no longer fits.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let nanos = 2u128
            .checked_pow(retry)
            .and_then(|factor| self.initial_retry_delay.as_nanos().checked_mul(factor));
        let Some(nanos) = nanos else {
            return Duration::MAX;
        };

        match u64::try_from(nanos / NANOS_PER_SEC) {
            Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
            Err(_) => Duration::MAX,
        }
    }
}

/// Returned when every attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Max retries reached after {attempts} attempts: {last_error}")]
pub struct CallFailure {
    pub attempts: u32,
    pub last_error: ServiceError,
}

/// A reasoning-service client with a private session and retry/backoff.
pub struct AnalysisClient {
    service: Arc<dyn ReasoningService>,
    session: Option<Session>,
    config: ClientConfig,
}

impl AnalysisClient {
    pub fn new(service: Arc<dyn ReasoningService>, config: ClientConfig) -> Self {
        Self {
            service,
            session: None,
            config,
        }
    }

    /// Send `prompt`, retrying with exponential backoff.
    ///
    /// Never panics on service errors; exhaustion is returned as [`CallFailure`].
    pub async fn call(&mut self, prompt: &str) -> Result<String, CallFailure> {
        let total_attempts = self.config.max_retries + 1;
        let preview: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
        let mut retry = 0u32;

        loop {
            let attempt = retry + 1;
            debug!(
                "Sending prompt (attempt {}/{}): {}...",
                attempt, total_attempts, preview
            );

            let err = match self.attempt(prompt).await {
                Ok(reply) => {
                    debug!("Received response ({} chars)", reply.chars().count());
                    return Ok(reply);
                }
                Err(err) => err,
            };

            warn!(
                "API call failed (attempt {}/{}): {}",
                attempt, total_attempts, err
            );

            if retry >= self.config.max_retries {
                error!("Max retries reached. Final error: {}", err);
                return Err(CallFailure {
                    attempts: attempt,
                    last_error: err,
                });
            }

            let delay = self.config.backoff_delay(retry);
            warn!("Retrying in {:?}...", delay);
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }

    async fn attempt(&mut self, prompt: &str) -> Result<String, ServiceError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                debug!("Opening new session with {}", self.service.model_name());
                // Only a successfully opened session is kept.
                self.service.open_session().await?
            }
        };

        let session = self.session.insert(session);
        self.service.send(session, prompt).await
    }
}
