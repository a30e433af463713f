//! Shared fixtures for the REST client tests.

#![allow(dead_code)]

use std::time::Duration;

use wiremock::MockServer;

use rk_api::{ApiClient, AuthSource, RetryConfig};

pub const AUTH_TOKEN: &str = "jwt-123";

/// The backend mounts its routes under `/api`.
pub fn api_root(server: &MockServer) -> String {
    format!("{}/api", server.uri())
}

/// Client authenticated with `AUTH_TOKEN` and a fast retry schedule.
pub fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&api_root(server), Duration::from_secs(5))
        .unwrap()
        .with_auth(AuthSource::Static(AUTH_TOKEN.into()))
        .with_retry_config(RetryConfig {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            ..RetryConfig::default()
        })
}
