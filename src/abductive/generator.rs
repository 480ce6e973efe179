//! The external hypothesis generator seam.
//!
//! The generator is typically a language model behind a network call. The
//! engine invokes it on a helper thread and waits on a bounded channel so
//! that caller timeouts and cancellation are honored even when the
//! generator itself blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::warn;

use crate::error::UpstreamError;

/// How often a waiting call re-checks cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Produces raw hypothesis candidates from a rendered prompt.
///
/// The returned text must parse as JSON of the form
/// `{"hypotheses": [{"description", "assumptions", "predictions", "parsimony", "prior_probability"}]}`,
/// optionally inside a fenced code block.
pub trait HypothesisGenerator: Send + Sync {
    /// Generates candidates for the prompt.
    ///
    /// Long-running implementations should poll `ctx.is_cancelled()`.
    fn generate(&self, ctx: &GenerationContext, prompt: &str) -> Result<String, UpstreamError>;
}

/// Cooperative cancellation flag shared between a caller and a generator call.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Caller-supplied limits for one generator call.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    timeout: Option<Duration>,
    cancellation: CancellationToken,
}

impl GenerationContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the generator call; without it the engine default applies.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Calls the generator, giving up at `timeout` or on cancellation.
///
/// The worker sees the effective timeout and its own cancellation token,
/// which is set when the caller cancels or the deadline passes. A worker
/// that does not poll the token is detached and its late result discarded.
pub(crate) fn call_with_deadline(
    generator: &Arc<dyn HypothesisGenerator>,
    ctx: &GenerationContext,
    prompt: String,
    timeout: Duration,
) -> Result<String, UpstreamError> {
    if ctx.is_cancelled() {
        return Err(UpstreamError::Cancelled);
    }

    let deadline = Instant::now()
        .checked_add(timeout)
        .ok_or(UpstreamError::Timeout {
            duration_ms: duration_ms(timeout),
        })?;

    let (tx, rx) = bounded(1);
    let worker_generator = Arc::clone(generator);
    let worker_token = CancellationToken::new();
    let worker_ctx = GenerationContext::new()
        .with_timeout(timeout)
        .with_cancellation(worker_token.clone());
    std::thread::Builder::new()
        .name("credence-generator".to_string())
        .spawn(move || {
            let result = worker_generator.generate(&worker_ctx, &prompt);
            // The receiver is gone if the caller timed out or cancelled.
            let _ = tx.send(result);
        })
        .map_err(|e| UpstreamError::GeneratorFailed {
            message: format!("failed to spawn generator thread: {e}"),
            transient: true,
        })?;

    loop {
        let now = Instant::now();
        if now >= deadline {
            worker_token.cancel();
            warn!(timeout_ms = duration_ms(timeout), "hypothesis generator timed out");
            return Err(UpstreamError::Timeout {
                duration_ms: duration_ms(timeout),
            });
        }
        let wait = (deadline - now).min(CANCEL_POLL_INTERVAL);

        match rx.recv_timeout(wait) {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(e)) => {
                warn!(error = %e, "hypothesis generator failed");
                return Err(e);
            }
            Err(RecvTimeoutError::Timeout) => {
                if ctx.is_cancelled() {
                    worker_token.cancel();
                    warn!("hypothesis generation cancelled by caller");
                    return Err(UpstreamError::Cancelled);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(UpstreamError::GeneratorFailed {
                    message: "generator thread terminated without a result".to_string(),
                    transient: false,
                });
            }
        }
    }
}

/// Generator returning a fixed response, for fixtures and offline use.
#[derive(Debug, Clone)]
pub struct FixedResponseGenerator {
    response: Result<String, UpstreamError>,
    delay: Option<Duration>,
}

impl FixedResponseGenerator {
    /// Always returns `response`.
    #[must_use]
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: Ok(response.into()),
            delay: None,
        }
    }

    /// Always fails with `error`.
    #[must_use]
    pub fn failing(error: UpstreamError) -> Self {
        Self {
            response: Err(error),
            delay: None,
        }
    }

    /// Sleeps before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl HypothesisGenerator for FixedResponseGenerator {
    fn generate(&self, _ctx: &GenerationContext, _prompt: &str) -> Result<String, UpstreamError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.response.clone()
    }
}
