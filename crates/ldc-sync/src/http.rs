//! Shared HTTP plumbing

use crate::config::CONNECT_TIMEOUT_SECS;
use ldc_common::{Result, SyncError};
use reqwest::{Client, Response};
use std::time::Duration;

const USER_AGENT: &str = concat!("ldc-sync/", env!("CARGO_PKG_VERSION"));

/// Build a client with the per-call timeout of its component
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()?;

    Ok(client)
}

/// Pass 2xx responses through; turn anything else into [`SyncError::Destination`]
/// carrying the response body.
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SyncError::destination(status.as_u16(), body))
}

/// Prefix a bare host with `https://`; full URLs are kept as they are.
pub fn normalize_base_url(host: &str) -> String {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}
