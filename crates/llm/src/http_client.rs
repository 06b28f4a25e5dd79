//! HTTP Client Factory
//!
//! Provides a factory function for building reqwest clients with a request
//! timeout and optional proxy.

use std::time::Duration;

use crate::types::{LlmError, LlmResult};

/// Build a `reqwest::Client` for provider calls.
///
/// - `Some(proxy_url)` -> route every request through the proxy
///   (`http://`, `https://` or `socks5://`)
/// - `None` -> explicitly disable proxy (`no_proxy`), ignoring env vars
pub fn build_http_client(timeout_secs: u64, proxy_url: Option<&str>) -> LlmResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs));
    match proxy_url {
        Some(raw) => {
            let parsed = url::Url::parse(raw).map_err(|e| LlmError::InvalidRequest {
                message: format!("Invalid proxy URL '{}': {}", raw, e),
            })?;
            let mut proxy =
                reqwest::Proxy::all(parsed.as_str()).map_err(|e| LlmError::InvalidRequest {
                    message: format!("Invalid proxy URL '{}': {}", raw, e),
                })?;
            if !parsed.username().is_empty() {
                proxy = proxy.basic_auth(parsed.username(), parsed.password().unwrap_or(""));
            }
            builder = builder.proxy(proxy);
        }
        None => {
            builder = builder.no_proxy();
        }
    }
    builder.build().map_err(|e| LlmError::Other {
        message: format!("Failed to build HTTP client: {}", e),
    })
}
