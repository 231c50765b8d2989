//! OpenAI client configuration with sensible defaults.
//!
//! Every model collaborator (vision, embeddings, chat) speaks the OpenAI API, so
//! a self-hosted server only needs its base URL configured.

use crate::error::{Result, SlideSearchError};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client for the given API base (OpenAI itself when `None`).
pub fn create_client(base_url: Option<&str>) -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(
    base_url: Option<&str>,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SlideSearchError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut config = OpenAIConfig::default();
    if let Some(url) = base_url.filter(|u| !u.is_empty()) {
        config = config.with_api_base(url.trim_end_matches('/'));
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}
