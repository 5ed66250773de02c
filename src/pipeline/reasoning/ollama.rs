use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::http::{build_client, send_json, trim_base_url};
use super::types::{Provider, ReasoningBackend, ReasoningRequest};
use super::ReasoningError;

/// Ollama HTTP client for on-premises inference.
pub struct OllamaBackend {
    base_url: String,
    model: String,
    client: Client,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, ReasoningError> {
        Ok(Self {
            base_url: trim_base_url(base_url),
            model: model.to_string(),
            client: build_client(timeout)?,
            timeout,
        })
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

fn build_request<'a>(model: &'a str, request: &ReasoningRequest<'a>) -> OllamaGenerateRequest<'a> {
    OllamaGenerateRequest {
        model,
        prompt: request.prompt,
        system: request.system,
        stream: false,
        options: OllamaOptions {
            temperature: request.temperature,
            num_predict: request.max_tokens,
        },
    }
}

impl ReasoningBackend for OllamaBackend {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &ReasoningRequest<'_>) -> Result<String, ReasoningError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = build_request(&self.model, request);

        let parsed: OllamaGenerateResponse =
            send_json(self.client.post(&url).json(&body), &self.base_url, self.timeout)?;

        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_disables_streaming() {
        let request = ReasoningRequest {
            system: "sys",
            prompt: "case",
            temperature: 0.3,
            max_tokens: 512,
        };
        let body = serde_json::to_value(build_request("medgemma:4b", &request)).unwrap();
        assert_eq!(body["model"], "medgemma:4b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["system"], "sys");
        assert_eq!(body["prompt"], "case");
        assert_eq!(body["options"]["num_predict"], 512);
    }

    #[test]
    fn parses_generate_response() {
        let raw = r#"{"model":"medgemma:4b","response":"CRITICALITY: LOW","done":true}"#;
        let parsed: OllamaGenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.response, "CRITICALITY: LOW");
    }

    #[test]
    fn ollama_client_trims_trailing_slash() {
        let backend = OllamaBackend::new("http://localhost:11434/", "medgemma:4b", Duration::from_secs(60)).unwrap();
        assert_eq!(backend.base_url, "http://localhost:11434");
        assert_eq!(backend.timeout, Duration::from_secs(60));
    }
}
