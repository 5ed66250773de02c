//! Post-generation reply sanitization.
//!
//! Strips model artifacts (reasoning blocks, unused tokens) before the reply
//! reaches the classifier, so a model "thinking out loud" about CRITICAL
//! findings cannot drive the keyword scan.

use std::sync::LazyLock;

use regex::Regex;

static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid regex"));

static THOUGHT_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<unused\d+>thought\n").expect("valid regex"));

static UNUSED_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));

/// Strip model-specific artifacts from a raw reply.
///
/// Handles:
/// 1. `<think>…</think>` blocks (hosted reasoning models); an unclosed block
///    swallows the rest of the reply
/// 2. MedGemma thinking prefix (`<unusedN>thought\n…`) served by Ollama
/// 3. Stray `<unusedN>` tokens
pub fn sanitize_reply(raw: &str) -> String {
    let mut text = THINK_BLOCK_RE.replace_all(raw, "").to_string();

    if let Some(idx) = text.to_ascii_lowercase().find("<think>") {
        text.truncate(idx);
    }

    if let Some(prefix) = THOUGHT_PREFIX_RE.find(&text) {
        text = text[prefix.end()..].to_string();
    }

    text = UNUSED_TOKEN_RE.replace_all(&text, "").to_string();

    text.trim().to_string()
}
