//! Shared helpers for the wiremock-driven integration tests
#![allow(dead_code)]

use ldc_sync::auth::TokenBroker;
use ldc_sync::config::{AuthConfig, BulkConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PLATFORM_TOKEN: &str = "platform-token";
pub const DESTINATION_TOKEN: &str = "dc-token";

/// Identity and token exchange endpoints, both pointing back at `server`
pub async fn mount_auth(server: &MockServer, expires_in: i64) {
    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": PLATFORM_TOKEN,
            "instance_url": server.uri(),
            "token_type": "Bearer",
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/services/a360/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": DESTINATION_TOKEN,
            "instance_url": server.uri(),
            "expires_in": expires_in,
        })))
        .mount(server)
        .await;
}

pub fn auth_config(server: &MockServer) -> AuthConfig {
    AuthConfig::new(server.uri(), "client-id", "client-secret", server.uri())
}

pub fn broker(server: &MockServer) -> Arc<TokenBroker> {
    Arc::new(TokenBroker::new(auth_config(server)).unwrap())
}

/// Bulk settings with millisecond polling
pub fn fast_bulk_config() -> BulkConfig {
    BulkConfig {
        poll_interval: Duration::from_millis(1),
        ..BulkConfig::default()
    }
}

pub fn bearer() -> String {
    format!("Bearer {}", DESTINATION_TOKEN)
}
