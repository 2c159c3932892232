//! HTTP Client Factory

use std::time::Duration;

use super::types::{LlmError, LlmResult};

/// Build a `reqwest::Client` with a whole-request timeout.
///
/// Proxy environment variables are ignored; providers talk to their
/// configured base URL directly.
pub fn build_http_client(timeout_secs: u64) -> LlmResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .no_proxy()
        .build()
        .map_err(|e| LlmError::Other {
            message: format!("failed to build HTTP client: {}", e),
        })
}
