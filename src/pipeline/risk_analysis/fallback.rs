//! Ordered fallback over reasoning backends, with call pacing.
//!
//! Backends are tried in configuration order. The first non-empty reply
//! wins; a timeout, an HTTP or parse error, or a blank reply moves on to the
//! next backend. Every outbound call, fallback attempts included, goes
//! through the same [`Pacer`].

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::pipeline::reasoning::{invoke, BackendReply, ReasoningBackend, ReasoningError, ReasoningRequest};

/// Enforces a minimum gap between the end of one outbound call and the
/// start of the next.
pub struct Pacer {
    min_gap: Duration,
    last_finished: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_finished: Mutex::new(None),
        }
    }

    pub fn min_gap(&self) -> Duration {
        self.min_gap
    }

    /// Run `call` once the gap since the previous call has elapsed.
    pub fn paced<T>(&self, call: impl FnOnce() -> T) -> T {
        self.wait_turn();
        let out = call();
        if let Ok(mut last) = self.last_finished.lock() {
            *last = Some(Instant::now());
        }
        out
    }

    fn wait_turn(&self) {
        let remaining = match self.last_finished.lock() {
            Ok(last) => last.map(|t| self.min_gap.saturating_sub(t.elapsed())),
            Err(_) => None,
        };
        if let Some(wait) = remaining.filter(|d| !d.is_zero()) {
            std::thread::sleep(wait);
        }
    }
}

/// One failed backend attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedAttempt {
    pub backend: String,
    pub error: ReasoningError,
}

impl std::fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.backend, self.error)
    }
}

pub struct FallbackChain {
    backends: Vec<Box<dyn ReasoningBackend>>,
    pacer: Pacer,
}

impl FallbackChain {
    pub fn new(backends: Vec<Box<dyn ReasoningBackend>>, pacer: Pacer) -> Self {
        Self { backends, pacer }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// `provider/model` of each backend, in order.
    pub fn labels(&self) -> Vec<String> {
        self.backends
            .iter()
            .map(|b| format!("{}/{}", b.provider(), b.model()))
            .collect()
    }

    /// Ask each backend in turn until one produces a usable reply.
    ///
    /// On exhaustion returns every attempt's error, in order.
    pub fn generate(&self, request: &ReasoningRequest<'_>) -> Result<BackendReply, Vec<FailedAttempt>> {
        let mut failures = Vec::new();

        for backend in &self.backends {
            let label = format!("{}/{}", backend.provider(), backend.model());

            match self.pacer.paced(|| invoke(backend.as_ref(), request)) {
                Ok(reply) => {
                    tracing::debug!(
                        provider = backend.provider().as_str(),
                        model = backend.model(),
                        elapsed_ms = reply.elapsed.as_millis() as u64,
                        fallbacks = failures.len(),
                        "Reasoning backend replied"
                    );
                    return Ok(reply);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = backend.provider().as_str(),
                        model = backend.model(),
                        error = %e,
                        "Reasoning backend failed, trying next"
                    );
                    failures.push(FailedAttempt {
                        backend: label,
                        error: e,
                    });
                }
            }
        }

        Err(failures)
    }
}
