//! Completion orchestrator.
//!
//! Drives the backend's create-thread / append-message / run / poll
//! protocol for one conversation, with bounded retry on rate limiting.
//! Everything the caller sees on failure is the opaque `Unavailable`
//! error; the underlying cause stays in the logs.

use crate::bindings::ThreadBindings;
use crate::config::ResponderConfig;
use crate::markup;
use anyhow::{Result, anyhow, bail};
use relay_assistant::{AssistantBackend, Run, RunStatus};
use relay_bus::ConversationId;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("assistant unavailable, please try again later")]
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_step: Duration,
    pub poll_interval: Duration,
    pub run_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ResponderConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &ResponderConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            initial_backoff: Duration::from_secs(cfg.initial_backoff_secs),
            backoff_step: Duration::from_secs(cfg.backoff_step_secs),
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            run_timeout: Duration::from_secs(cfg.run_timeout_secs),
        }
    }
}

pub struct Responder {
    backend: Arc<dyn AssistantBackend>,
    bindings: Arc<ThreadBindings>,
    policy: RetryPolicy,
}

impl Responder {
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        bindings: Arc<ThreadBindings>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            bindings,
            policy,
        }
    }

    /// Produce a rendered reply for `prompt` on the conversation's backend
    /// thread. `Ok(String::new())` means the prompt could not be recorded
    /// and no reply should be posted.
    #[tracing::instrument(level = "info", skip_all, fields(conversation = %conversation))]
    pub async fn respond(
        &self,
        conversation: &ConversationId,
        prompt: &str,
        assistant_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ResponderError> {
        match self
            .try_respond(conversation, prompt, assistant_id, cancel)
            .await
        {
            Ok(text) => Ok(text),
            Err(error) => {
                tracing::error!(%error, "completion failed");
                Err(ResponderError::Unavailable)
            }
        }
    }

    async fn try_respond(
        &self,
        conversation: &ConversationId,
        prompt: &str,
        assistant_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        // One completion at a time per conversation: resolve-or-create must
        // not race, and replies stay in order.
        let lock = self.bindings.conversation_lock(conversation);
        let _guard = lock.lock().await;

        let thread_id = match self.bindings.get(conversation).await? {
            Some(thread_id) => thread_id,
            None => {
                let thread_id = self.backend.create_thread().await?;
                self.bindings.put(conversation, &thread_id).await?;
                tracing::info!(thread_id = %thread_id, "created backend thread for conversation");
                thread_id
            }
        };

        // A prompt that cannot be recorded degrades to "no reply"; the
        // conversation goes on without the assistant.
        if let Err(error) = self.backend.append_user_message(&thread_id, prompt).await {
            tracing::warn!(%error, thread_id = %thread_id, "prompt append failed, skipping reply");
            return Ok(String::new());
        }

        let mut backoff = self.policy.initial_backoff;
        for attempt in 1..=self.policy.max_attempts {
            let run = self.backend.create_run(&thread_id, assistant_id).await?;
            let run = self.poll_run(&thread_id, run, cancel).await?;

            match run.status {
                RunStatus::Completed => {
                    let text = self
                        .backend
                        .latest_message_text(&thread_id)
                        .await?
                        .ok_or_else(|| {
                            anyhow!("run {} completed but the thread has no reply", run.id)
                        })?;
                    return Ok(markup::render_markdown(&text));
                }
                RunStatus::Failed => {
                    let Some(error) = run.last_error else {
                        bail!("run {} failed without error detail", run.id);
                    };
                    if error.is_rate_limit() {
                        tracing::warn!(
                            attempt,
                            backoff_secs = backoff.as_secs(),
                            "rate limited, backing off"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff += self.policy.backoff_step;
                        continue;
                    }
                    bail!("run {} failed: {} ({})", run.id, error.code, error.message);
                }
                other => bail!("run {} ended in unexpected status {other:?}", run.id),
            }
        }
        bail!(
            "retries exhausted after {} rate-limited attempts",
            self.policy.max_attempts
        )
    }

    async fn poll_run(
        &self,
        thread_id: &str,
        mut run: Run,
        cancel: &CancellationToken,
    ) -> Result<Run> {
        let deadline = Instant::now() + self.policy.run_timeout;
        while run.status.is_pending() {
            if Instant::now() >= deadline {
                bail!(
                    "run {} still {:?} after {:?}",
                    run.id,
                    run.status,
                    self.policy.run_timeout
                );
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    bail!("completion cancelled while run {} was {:?}", run.id, run.status)
                }
                _ = tokio::time::sleep(self.policy.poll_interval) => {}
            }
            run = self.backend.retrieve_run(thread_id, &run.id).await?;
        }
        Ok(run)
    }
}
