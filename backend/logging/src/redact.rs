//! Log Redaction
//!
//! Scrubs API keys from strings before they reach the logs.

use regex::Regex;
use std::sync::LazyLock;

static GENERATED_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9a-fA-F]{40}\b").unwrap());
static APIKEY_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""apikey"\s*:\s*"[^"]*""#).unwrap());

/// Characters of a key kept visible by [`mask_key`].
const VISIBLE_PREFIX: usize = 6;

/// Redacts API keys in free text (backend error bodies, request dumps).
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = APIKEY_FIELD_RE.replace_all(input, r#""apikey":"[REDACTED]""#);
    GENERATED_KEY_RE
        .replace_all(&redacted, "[REDACTED_KEY]")
        .into_owned()
}

/// Show only the first few characters of a key.
pub fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(VISIBLE_PREFIX).collect();
    if prefix.len() == key.len() {
        "*".repeat(key.chars().count())
    } else {
        format!("{prefix}…")
    }
}
