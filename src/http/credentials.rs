//! Cached bearer token obtained through the OAuth client-credentials flow.
//!
//! [`CredentialCache::get_token`] returns the cached token while it is still
//! usable and performs a single exchange otherwise. The read-check-refresh
//! sequence runs under one async mutex, so callers racing past expiry share a
//! single refresh and never observe a token without its matching expiry.

use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::error::AuthError;
use super::gateway::HttpGateway;

/// Default buffer subtracted from a token's expiry.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(30);

/// Longest lifetime a token is trusted for, whatever the server announces.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A bearer token together with the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct Credential {
    token: String,
    expires_at: Instant,
}

impl Credential {
    pub fn new(token: String, expires_at: Instant) -> Self {
        Self { token, expires_at }
    }

    /// True while `now < expires_at - margin`.
    pub fn is_usable(&self, now: Instant, margin: Duration) -> bool {
        self.expires_at
            .checked_sub(margin)
            .is_some_and(|limit| now < limit)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Owns the only copy of the current [`Credential`].
#[derive(Debug)]
pub struct CredentialCache {
    gateway: HttpGateway,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    safety_margin: Duration,
    current: Mutex<Option<Credential>>,
}

impl CredentialCache {
    pub fn new(
        gateway: HttpGateway,
        token_url: impl Into<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            gateway,
            token_url: token_url.into(),
            client_id: client_id.filter(|s| !s.trim().is_empty()),
            client_secret: client_secret.filter(|s| !s.trim().is_empty()),
            safety_margin: DEFAULT_SAFETY_MARGIN,
            current: Mutex::new(None),
        }
    }

    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    /// Return a usable bearer token, refreshing it first if needed.
    pub async fn get_token(&self) -> Result<String, AuthError> {
        let mut current = self.current.lock().await;

        if let Some(credential) = current.as_ref() {
            if credential.is_usable(Instant::now(), self.safety_margin) {
                return Ok(credential.token.clone());
            }
            debug!("cached token is stale, refreshing");
        }

        let fresh = self.exchange().await?;
        let token = fresh.token.clone();
        *current = Some(fresh);
        Ok(token)
    }

    async fn exchange(&self) -> Result<Credential, AuthError> {
        let (Some(id), Some(secret)) = (&self.client_id, &self.client_secret) else {
            return Err(AuthError::MissingCredentials);
        };

        let basic = STANDARD.encode(format!("{id}:{secret}"));
        let response = self
            .gateway
            .post_form(
                &self.token_url,
                "grant_type=client_credentials",
                Some(&format!("Basic {basic}")),
            )
            .await?;

        if !response.is_success() {
            return Err(AuthError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        let parsed: TokenResponse = response
            .json()
            .map_err(|e| AuthError::MalformedResponse(format!("{e}: {}", response.body)))?;

        let token = parsed.access_token.filter(|t| !t.is_empty());
        let lifetime = parsed.expires_in.filter(|secs| *secs > 0);
        let (Some(token), Some(lifetime)) = (token, lifetime) else {
            return Err(AuthError::MalformedResponse(response.body));
        };

        info!(expires_in = lifetime, "obtained new access token");
        let lifetime = Duration::from_secs(lifetime.unsigned_abs()).min(MAX_TOKEN_LIFETIME);
        let expires_at = Instant::now().checked_add(lifetime).ok_or_else(|| {
            AuthError::MalformedResponse(format!("unusable lifetime: {}", response.body))
        })?;
        Ok(Credential::new(token, expires_at))
    }
}
