//! Reasoning backends. A uniform contract over the hosted and local LLM services
//! used to assess patient risk.
//!
//! Every vendor is one adapter implementing [`ReasoningBackend`]. The rest of
//! the pipeline only ever sees the trait, so swapping or chaining vendors never
//! touches the selector, classifier or store.

pub mod types;
pub mod sanitize;
pub mod http;
pub mod anthropic;
pub mod openai;
pub mod gemini;
pub mod ollama;
#[cfg(test)]
pub mod mock;

pub use types::*;
pub use sanitize::sanitize_reply;
pub use anthropic::AnthropicBackend;
pub use openai::OpenAiCompatibleBackend;
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;

use std::time::Duration;

use thiserror::Error;

use crate::config::BackendSpec;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReasoningError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Reasoning backend is not reachable at {0}")]
    Connection(String),

    #[error("Backend returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Backend returned an empty response")]
    EmptyResponse,

    #[error("No credential configured for {0}")]
    MissingCredential(&'static str),
}

/// Build the adapter for one configured chain entry.
pub fn build_backend(
    spec: &BackendSpec,
    timeout: Duration,
) -> Result<Box<dyn ReasoningBackend>, ReasoningError> {
    let base_url = spec
        .base_url
        .as_deref()
        .unwrap_or_else(|| spec.provider.default_base_url());

    let credential = || {
        spec.credential
            .clone()
            .ok_or(ReasoningError::MissingCredential(spec.provider.as_str()))
    };

    let backend: Box<dyn ReasoningBackend> = match spec.provider {
        Provider::Anthropic => Box::new(AnthropicBackend::new(
            base_url,
            &spec.model,
            credential()?,
            timeout,
        )?),
        Provider::OpenAi | Provider::Groq => Box::new(OpenAiCompatibleBackend::new(
            spec.provider,
            base_url,
            &spec.model,
            credential()?,
            timeout,
        )?),
        Provider::Gemini => Box::new(GeminiBackend::new(
            base_url,
            &spec.model,
            credential()?,
            timeout,
        )?),
        Provider::Ollama => Box::new(OllamaBackend::new(base_url, &spec.model, timeout)?),
    };

    Ok(backend)
}
