use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::http::{build_client, send_json, trim_base_url};
use super::types::{Provider, ReasoningBackend, ReasoningRequest};
use super::ReasoningError;

/// Google Gemini `generateContent` client.
pub struct GeminiBackend {
    base_url: String,
    model: String,
    api_key: Zeroizing<String>,
    client: Client,
    timeout: Duration,
}

impl GeminiBackend {
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

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

fn build_request<'a>(request: &ReasoningRequest<'a>) -> GenerateRequest<'a> {
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: [Part { text: request.system }],
        },
        contents: [Content {
            role: Some("user"),
            parts: [Part { text: request.prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        },
    }
}

/// Text of the first candidate. A safety-blocked prompt has no candidates and
/// yields empty text, which `invoke` reports as an empty response.
fn extract_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

impl ReasoningBackend for GeminiBackend {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &ReasoningRequest<'_>) -> Result<String, ReasoningError> {
        let body = build_request(request);

        let http_request = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&body);

        let parsed: GenerateResponse = send_json(http_request, &self.base_url, self.timeout)?;
        Ok(extract_text(parsed))
    }
}
