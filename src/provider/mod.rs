mod client;
mod func;
mod gemini;
mod openai;
mod registry;
mod traits;

pub use client::{GenerationClient, DEFAULT_SYSTEM_PROMPT};
pub use func::{FnProvider, GenerateFn};
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
pub use registry::ProviderRegistry;
pub use traits::*;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::error::ServiceError;

const DEFAULT_RETRY_AFTER_MS: u64 = 5000;

/// `Retry-After` (seconds) in milliseconds, or the default backoff
fn retry_after_ms(headers: &HeaderMap) -> u64 {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
        .unwrap_or(DEFAULT_RETRY_AFTER_MS)
}

/// Map a non-success HTTP status to a service error
fn status_error(provider: &str, status: StatusCode, retry_after_ms: u64, body: &str) -> ServiceError {
    match status.as_u16() {
        429 => ServiceError::RateLimited {
            provider: provider.into(),
            retry_after_ms,
        },
        401 | 403 => ServiceError::Auth(format!("{provider} auth failed: {body}")),
        _ => ServiceError::Provider(format!("{provider} API error {status}: {body}")),
    }
}
