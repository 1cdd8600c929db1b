//! Credential check against the Hugging Face Hub.

use super::ProviderError;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;

/// HTTP client for hub and inference calls. Only connecting is bounded:
/// generating a full quiz can take minutes.
pub fn http_client() -> Result<Client, ProviderError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))
}

/// Ask the hub who owns `token`. A rejected token is `Unauthorized`.
pub async fn verify_token(
    client: &Client,
    hub_endpoint: &str,
    token: &Secret<String>,
) -> Result<(), ProviderError> {
    let url = format!("{}/api/whoami-v2", hub_endpoint.trim_end_matches('/'));

    let response = client
        .get(url)
        .bearer_auth(token.expose_secret())
        .send()
        .await
        .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

    match response.status() {
        status if status.is_success() => Ok(()),
        status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => Err(
            ProviderError::Unauthorized(format!("hub rejected token ({})", status)),
        ),
        status => Err(ProviderError::ApiError(format!(
            "credential check failed: {}",
            status
        ))),
    }
}
