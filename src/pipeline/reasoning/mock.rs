//! Mock backend for tests. Returns a configured reply or error and counts calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::types::{Provider, ReasoningBackend, ReasoningRequest};
use super::ReasoningError;

pub struct MockBackend {
    provider: Provider,
    model: String,
    outcome: Result<String, ReasoningError>,
    calls: Arc<AtomicUsize>,
    last_prompt: Arc<Mutex<Option<String>>>,
}

impl MockBackend {
    pub fn replying(provider: Provider, model: &str, reply: &str) -> Self {
        Self::with_outcome(provider, model, Ok(reply.to_string()))
    }

    pub fn failing(provider: Provider, model: &str, error: ReasoningError) -> Self {
        Self::with_outcome(provider, model, Err(error))
    }

    fn with_outcome(provider: Provider, model: &str, outcome: Result<String, ReasoningError>) -> Self {
        Self {
            provider,
            model: model.to_string(),
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
            last_prompt: Arc::new(Mutex::new(None)),
        }
    }

    /// Shared counter, still readable after the mock is boxed into a chain.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn prompt_probe(&self) -> Arc<Mutex<Option<String>>> {
        self.last_prompt.clone()
    }
}

impl ReasoningBackend for MockBackend {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &ReasoningRequest<'_>) -> Result<String, ReasoningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut slot) = self.last_prompt.lock() {
            *slot = Some(request.prompt.to_string());
        }
        self.outcome.clone()
    }
}
