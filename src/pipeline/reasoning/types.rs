use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::sanitize::sanitize_reply;
use super::ReasoningError;

/// The vendors a chain entry can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Anthropic,
    OpenAi,
    Groq,
    Gemini,
    Ollama,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Some(Self::Anthropic),
            "openai" => Some(Self::OpenAi),
            "groq" => Some(Self::Groq),
            "gemini" | "google" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn all() -> &'static [Provider] {
        &[Self::Anthropic, Self::OpenAi, Self::Groq, Self::Gemini, Self::Ollama]
    }

    /// Environment variable holding the API key. `None` for local runtimes.
    pub fn credential_env(&self) -> Option<&'static str> {
        match self {
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Groq => Some("GROQ_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Ollama => None,
        }
    }

    /// Environment variable overriding the endpoint.
    pub fn base_url_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_BASE_URL",
            Self::OpenAi => "OPENAI_BASE_URL",
            Self::Groq => "GROQ_BASE_URL",
            Self::Gemini => "GEMINI_BASE_URL",
            Self::Ollama => "OLLAMA_HOST",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::Ollama => "http://localhost:11434",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One outbound generation request.
#[derive(Debug, Clone, Copy)]
pub struct ReasoningRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A successful, non-empty reply and how long it took.
#[derive(Debug, Clone)]
pub struct BackendReply {
    pub text: String,
    pub elapsed: Duration,
    pub provider: Provider,
    pub model: String,
}

/// A reasoning service able to answer a single prompt.
///
/// Implementations perform exactly one outbound call per `generate` and must
/// bound it with their own timeout.
pub trait ReasoningBackend: Send + Sync {
    fn provider(&self) -> Provider;

    fn model(&self) -> &str;

    /// Return the raw reply text.
    fn generate(&self, request: &ReasoningRequest<'_>) -> Result<String, ReasoningError>;
}

/// Call a backend once, timing the call and normalising the reply.
///
/// A reply that is blank after sanitization counts as a failure so the
/// fallback chain moves on instead of persisting an empty analysis.
pub fn invoke(
    backend: &dyn ReasoningBackend,
    request: &ReasoningRequest<'_>,
) -> Result<BackendReply, ReasoningError> {
    let start = Instant::now();
    let raw = backend.generate(request)?;
    let elapsed = start.elapsed();

    let text = sanitize_reply(&raw);
    if text.is_empty() {
        return Err(ReasoningError::EmptyResponse);
    }

    Ok(BackendReply {
        text,
        elapsed,
        provider: backend.provider(),
        model: backend.model().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::reasoning::mock::MockBackend;

    fn request() -> ReasoningRequest<'static> {
        ReasoningRequest {
            system: "system",
            prompt: "prompt",
            temperature: 0.3,
            max_tokens: 100,
        }
    }

    #[test]
    fn provider_round_trip() {
        for provider in Provider::all() {
            assert_eq!(Provider::from_str(provider.as_str()), Some(*provider));
        }
    }

    #[test]
    fn provider_aliases_and_case() {
        assert_eq!(Provider::from_str("Claude"), Some(Provider::Anthropic));
        assert_eq!(Provider::from_str(" GROQ "), Some(Provider::Groq));
        assert_eq!(Provider::from_str("google"), Some(Provider::Gemini));
        assert_eq!(Provider::from_str("mistral"), None);
    }

    #[test]
    fn only_local_runtime_lacks_credential() {
        assert!(Provider::Ollama.credential_env().is_none());
        assert_eq!(Provider::Groq.credential_env(), Some("GROQ_API_KEY"));
    }

    #[test]
    fn invoke_returns_sanitized_text_and_identity() {
        let backend = MockBackend::replying(Provider::Groq, "llama", "  CRITICALITY: LOW  \n");
        let reply = invoke(&backend, &request()).unwrap();
        assert_eq!(reply.text, "CRITICALITY: LOW");
        assert_eq!(reply.provider, Provider::Groq);
        assert_eq!(reply.model, "llama");
    }

    #[test]
    fn invoke_rejects_blank_reply() {
        let backend = MockBackend::replying(Provider::Groq, "llama", "   \n\t");
        assert_eq!(invoke(&backend, &request()).err(), Some(ReasoningError::EmptyResponse));
    }

    #[test]
    fn invoke_rejects_reply_that_is_only_reasoning() {
        let backend = MockBackend::replying(Provider::Groq, "qwen", "<think>hmm, let me see</think>");
        assert_eq!(invoke(&backend, &request()).err(), Some(ReasoningError::EmptyResponse));
    }

    #[test]
    fn invoke_propagates_backend_error() {
        let backend = MockBackend::failing(Provider::Gemini, "flash", ReasoningError::Timeout(30));
        assert_eq!(invoke(&backend, &request()).err(), Some(ReasoningError::Timeout(30)));
    }
}
