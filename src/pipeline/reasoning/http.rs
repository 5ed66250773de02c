//! Shared blocking HTTP plumbing for the hosted adapters.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use super::ReasoningError;

/// Longest error body kept in a `Status` error.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Build a client whose every request is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> Result<Client, ReasoningError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
        .map_err(|e| ReasoningError::HttpClient(e.to_string()))
}

/// Normalise a base URL: no trailing slash.
pub fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Send a prepared request and decode a JSON body, mapping every failure
/// mode onto [`ReasoningError`].
pub fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    base_url: &str,
    timeout: Duration,
) -> Result<T, ReasoningError> {
    let response = request.send().map_err(|e| {
        if e.is_timeout() {
            ReasoningError::Timeout(timeout.as_secs())
        } else if e.is_connect() {
            ReasoningError::Connection(base_url.to_string())
        } else {
            ReasoningError::HttpClient(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ReasoningError::Status {
            status: status.as_u16(),
            body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
        });
    }

    response.json::<T>().map_err(|e| {
        if e.is_timeout() {
            ReasoningError::Timeout(timeout.as_secs())
        } else {
            ReasoningError::MalformedResponse(e.to_string())
        }
    })
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
