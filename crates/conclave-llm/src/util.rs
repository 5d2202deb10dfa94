//! Common utilities for LLM providers
//!
//! API key hygiene shared by every adapter: masking keys for logs, deciding whether a
//! configured key is usable at all, and scrubbing provider error bodies.

use regex::Regex;
use std::sync::LazyLock;

/// Minimum key length to display partial key
const MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY: usize = 8;

/// Number of characters to show at start/end of masked key
const KEY_MASK_VISIBLE_CHARS: usize = 4;

/// Keys shorter than this (after trimming) are never sent to a provider
pub const MIN_USABLE_KEY_LENGTH: usize = 16;

/// Maximum length of a provider error body carried in an error message
const MAX_ERROR_BODY_LEN: usize = 300;

/// Values that are obviously copied from documentation or `.env.example` files
static PLACEHOLDER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)your[_-]?api[_-]?key",
        r"(?i)replace[_-]?me",
        r"(?i)example",
        r"(?i)^sk-test",
        r"(?i)^test[_-]?key",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Mask API key for safe display in logs
///
/// Shows first 4 and last 4 characters for keys longer than 8 characters,
/// otherwise shows "****" to prevent exposure of short keys.
///
/// # Examples
/// ```
/// use conclave_llm::util::mask_api_key;
/// assert_eq!(mask_api_key("sk-1234567890abcdef"), "sk-1...cdef");
/// assert_eq!(mask_api_key("short"), "****");
/// ```
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY {
        return "****".to_string();
    }
    let head: String = chars[..KEY_MASK_VISIBLE_CHARS].iter().collect();
    let tail: String = chars[chars.len() - KEY_MASK_VISIBLE_CHARS..].iter().collect();
    format!("{head}...{tail}")
}

/// Strip whitespace and zero-width characters that sneak in through copy/paste
#[must_use]
pub fn sanitize_api_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}'))
        .collect()
}

/// Whether a key is usable for live requests
///
/// A key is usable when it is at least [`MIN_USABLE_KEY_LENGTH`] characters long
/// after trimming and matches none of the known placeholder patterns.
///
/// # Examples
/// ```
/// use conclave_llm::util::has_usable_api_key;
/// assert!(has_usable_api_key("sk-live-9f8e7d6c5b4a39281706"));
/// assert!(!has_usable_api_key("your-api-key-goes-here"));
/// assert!(!has_usable_api_key("short"));
/// ```
#[must_use]
pub fn has_usable_api_key(key: &str) -> bool {
    let key = key.trim();
    if key.chars().count() < MIN_USABLE_KEY_LENGTH {
        return false;
    }
    !PLACEHOLDER_PATTERNS.iter().any(|pattern| pattern.is_match(key))
}

/// Truncate a string to at most `max_chars` characters without splitting a code point
#[must_use]
pub fn truncate_safe(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Sanitize a provider error body so it never leaks credentials
///
/// Authentication failures collapse into a generic message naming the environment
/// variable to check. Long bodies are truncated.
#[must_use]
pub fn sanitize_api_error(error: &str, key_hint: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("api_key")
        || lower.contains("invalid key")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
        || lower.contains("bearer")
    {
        return format!("API authentication error. Please check your {key_hint}.");
    }

    if lower.contains("rate limit") || lower.contains("quota") || lower.contains("overloaded") {
        return "API rate limit exceeded. Please try again later.".to_string();
    }

    if error.chars().count() > MAX_ERROR_BODY_LEN {
        format!("{}...(truncated)", truncate_safe(error, MAX_ERROR_BODY_LEN))
    } else {
        error.to_string()
    }
}
