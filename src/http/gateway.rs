use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::TransportError;

/// Bounded linear backoff applied to one logical call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Base unit of the linear backoff.
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_unit: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt with the given zero-based index.
    /// delay = backoff_unit * (attempt_index + 1)
    pub fn delay_for_attempt(&self, attempt_index: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt_index.saturating_add(1))
    }
}

/// A fully read HTTP response.
///
/// Non-2xx statuses are returned as ordinary responses; deciding whether a
/// status is fatal belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Run `call` until it succeeds or the policy's retries are exhausted.
///
/// Only retryable transport failures are retried. The last failure is
/// surfaced once `max_retries` additional attempts have been made.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut call: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "{what} failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                debug!(attempts = attempt + 1, error = %err, "{what} failed, giving up");
                return Err(err);
            }
        }
    }
}

impl TransportError {
    /// Whether another attempt of the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            TransportError::Interrupted | TransportError::InvalidUrl(_) => false,
        }
    }
}

/// Stateless HTTP access shared by every outbound client.
///
/// Cloning is cheap: the underlying connection pool is reference counted.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    retry: RetryPolicy,
}

impl HttpGateway {
    /// Build a gateway with a process-wide connect timeout.
    pub fn new(
        connect_timeout: Duration,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client, retry })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn get(&self, url: &str, auth: Option<&str>) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.get(url);
        if let Some(value) = auth {
            request = request.header("Authorization", value);
        }
        self.send("GET", url, request).await
    }

    pub async fn post_form(
        &self,
        url: &str,
        body: &str,
        auth: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body.to_string());
        if let Some(value) = auth {
            request = request.header("Authorization", value);
        }
        self.send("POST", url, request).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        auth: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.post(url).json(body);
        if let Some(value) = auth {
            request = request.header("Authorization", value);
        }
        self.send("POST", url, request).await
    }

    pub async fn get_with_retry(
        &self,
        url: &str,
        auth: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        with_retry(&self.retry, "GET", || self.get(url, auth)).await
    }

    pub async fn post_form_with_retry(
        &self,
        url: &str,
        body: &str,
        auth: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        with_retry(&self.retry, "POST", || self.post_form(url, body, auth)).await
    }

    pub async fn post_json_with_retry<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        auth: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        with_retry(&self.retry, "POST", || self.post_json(url, body, auth)).await
    }

    async fn send(
        &self,
        method: &str,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<HttpResponse, TransportError> {
        debug!(%method, %url, "sending HTTP request");
        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::InvalidUrl(format!("{url}: {e}"))
            } else {
                TransportError::Network(e)
            }
        })?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(%method, %url, status, "received HTTP response");
        Ok(HttpResponse { status, body })
    }
}
