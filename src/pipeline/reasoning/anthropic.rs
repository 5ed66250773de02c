use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::http::{build_client, send_json, trim_base_url};
use super::types::{Provider, ReasoningBackend, ReasoningRequest};
use super::ReasoningError;

const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client.
pub struct AnthropicBackend {
    base_url: String,
    model: String,
    api_key: Zeroizing<String>,
    client: Client,
    timeout: Duration,
}

impl AnthropicBackend {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Zeroizing<String>,
        timeout: Duration,
    ) -> Result<Self, ReasoningError> {
        Ok(Self {
            base_url: trim_base_url(base_url),
            model: model.to_string(),
            api_key,
            client: build_client(timeout)?,
            timeout,
        })
    }
}

/// Request body for `/v1/messages`
#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Response body from `/v1/messages`
#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn build_request<'a>(model: &'a str, request: &ReasoningRequest<'a>) -> MessagesRequest<'a> {
    MessagesRequest {
        model,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        system: request.system,
        messages: [UserMessage {
            role: "user",
            content: request.prompt,
        }],
    }
}

/// Join every text block; tool-use and other block kinds are ignored.
fn extract_text(response: MessagesResponse) -> String {
    response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n")
}

impl ReasoningBackend for AnthropicBackend {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &ReasoningRequest<'_>) -> Result<String, ReasoningError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = build_request(&self.model, request);

        let http_request = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", API_VERSION)
            .json(&body);

        let parsed: MessagesResponse = send_json(http_request, &self.base_url, self.timeout)?;
        Ok(extract_text(parsed))
    }
}
