//! Shared HTTP plumbing for the adapters
//!
//! Maps transport failures and non-success statuses onto [`Error`] the same way for
//! every vendor.

use crate::error::{Error, Result};
use crate::provider::ProviderKind;
use crate::util::sanitize_api_error;
use reqwest::{Response, StatusCode};
use std::time::Duration;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default completion budget
pub const DEFAULT_MAX_TOKENS: u32 = 1200;

/// Build a reqwest client with the given timeout
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Network(format!("failed to create HTTP client: {e}")))
}

/// Map a transport error from `send()`
pub(crate) fn map_send_error(err: reqwest::Error, kind: ProviderKind, timeout: Duration) -> Error {
    if err.is_timeout() {
        return Error::Timeout(timeout.as_millis() as u64);
    }
    if err.is_connect() {
        return Error::Network(format!(
            "cannot connect to {} API - network or DNS issue",
            kind.display_name()
        ));
    }
    Error::Network(sanitize_api_error(&err.to_string(), key_hint(kind)))
}

/// Turn a non-success response into an error, passing successful ones through
pub(crate) async fn ensure_success(response: Response, kind: ProviderKind) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(Error::Unauthorized(kind.display_name().to_string()))
        }
        StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimit(kind.display_name().to_string())),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Api {
                status: status.as_u16(),
                message: sanitize_api_error(&body, key_hint(kind)),
            })
        }
    }
}

/// Environment variable a user should check when a key is rejected
#[must_use]
pub fn key_hint(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "OPENAI_API_KEY",
        ProviderKind::Kimi => "KIMI_API_KEY",
        ProviderKind::Perplexity => "PERPLEXITY_KEY",
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
    }
}
