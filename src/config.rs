//! Configuration loaded from `musemix.toml`.
//!
//! Every key has a default, so a missing file or a partial file is fine.
//! Provider credentials are checked only when the provider is first used.
//! Non-empty environment variables take precedence over the file for
//! credentials and the generation base URL.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::error::MuseError;
use crate::generation::PollPolicy;
use crate::http::{HttpGateway, RetryPolicy, TransportError};

pub const DEFAULT_CONFIG_FILE: &str = "musemix.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MuseConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub suno: SunoConfig,
}

/// Settings shared by every outbound call.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Connect timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Linear backoff unit in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_token_margin_secs")]
    pub token_margin_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SunoConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Zero disables the wall-clock bound.
    #[serde(default = "default_poll_deadline_ms")]
    pub poll_deadline_ms: u64,
}

fn default_timeout_ms() -> u64 {
    8000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_api_base() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_token_margin_secs() -> u64 {
    30
}

fn default_model() -> String {
    "sonic-v5".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_poll_attempts() -> u32 {
    20
}

fn default_poll_deadline_ms() -> u64 {
    120_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: default_token_url(),
            api_base: default_api_base(),
            token_margin_secs: default_token_margin_secs(),
        }
    }
}

impl Default for SunoConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: default_model(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            poll_deadline_ms: default_poll_deadline_ms(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl MuseConfig {
    /// Load from `path`, or from `musemix.toml` in the working directory.
    /// Falls back to defaults when the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<MuseConfig>(&contents)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override credentials from the environment through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let pick = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = pick("SPOTIFY_CLIENT_ID") {
            self.spotify.client_id = Some(v);
        }
        if let Some(v) = pick("SPOTIFY_CLIENT_SECRET") {
            self.spotify.client_secret = Some(v);
        }
        if let Some(v) = pick("SUNO_BASE_URL") {
            self.suno.base_url = Some(v);
        }
        if let Some(v) = pick("SUNO_API_KEY") {
            self.suno.api_key = Some(v);
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.api.max_retries,
            backoff_unit: Duration::from_millis(self.api.backoff_ms),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.suno.poll_interval_ms),
            max_attempts: self.suno.max_poll_attempts,
            deadline: (self.suno.poll_deadline_ms > 0)
                .then(|| Duration::from_millis(self.suno.poll_deadline_ms)),
        }
    }

    pub fn build_gateway(&self) -> Result<HttpGateway, TransportError> {
        HttpGateway::new(
            Duration::from_millis(self.api.timeout_ms),
            Duration::from_millis(self.api.request_timeout_ms),
            self.retry_policy(),
        )
    }

    /// Base URL and API key of the generation service.
    pub fn require_suno(&self) -> Result<(&str, &str), MuseError> {
        let base_url = non_blank(&self.suno.base_url)
            .ok_or_else(|| MuseError::Config("suno.base_url is not set".into()))?;
        let api_key = non_blank(&self.suno.api_key)
            .ok_or_else(|| MuseError::Config("suno.api_key is not set".into()))?;
        Ok((base_url, api_key))
    }
}
