use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::http::{build_client, send_json, trim_base_url};
use super::types::{Provider, ReasoningBackend, ReasoningRequest};
use super::ReasoningError;

/// Chat-completions client for OpenAI and OpenAI-compatible hosts (Groq).
pub struct OpenAiCompatibleBackend {
    provider: Provider,
    base_url: String,
    model: String,
    api_key: Zeroizing<String>,
    client: Client,
    timeout: Duration,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        provider: Provider,
        base_url: &str,
        model: &str,
        api_key: Zeroizing<String>,
        timeout: Duration,
    ) -> Result<Self, ReasoningError> {
        Ok(Self {
            provider,
            base_url: trim_base_url(base_url),
            model: model.to_string(),
            api_key,
            client: build_client(timeout)?,
            timeout,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_request<'a>(model: &'a str, request: &ReasoningRequest<'a>) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: [
            ChatMessage {
                role: "system",
                content: request.system,
            },
            ChatMessage {
                role: "user",
                content: request.prompt,
            },
        ],
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

fn extract_text(response: ChatResponse) -> Result<String, ReasoningError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ReasoningError::MalformedResponse("No choices in completion".into()))?;
    Ok(choice.message.content.unwrap_or_default())
}

impl ReasoningBackend for OpenAiCompatibleBackend {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &ReasoningRequest<'_>) -> Result<String, ReasoningError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = build_request(&self.model, request);

        let http_request = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.as_str())
            .json(&body);

        let parsed: ChatResponse = send_json(http_request, &self.base_url, self.timeout)?;
        extract_text(parsed)
    }
}
