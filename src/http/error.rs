//! Error types for outbound HTTP access.
//!
//! [`TransportError`] covers failures below the HTTP layer (connection refused,
//! timeouts, interrupted waits). These are the only failures the gateway retries.
//! [`AuthError`] covers the client-credentials exchange and is never retried.

use thiserror::Error;

/// Network-level failure of a single outbound call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the body could not be read.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A wait between attempts was interrupted before it completed.
    #[error("wait interrupted before the next attempt")]
    Interrupted,

    /// The target URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Failure to obtain a bearer token through the client-credentials exchange.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Client id or secret is not configured.
    #[error("client credentials are not configured")]
    MissingCredentials,

    /// The token endpoint answered with a non-success status.
    #[error("token exchange rejected (status {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The token endpoint answered 2xx but the body lacked a usable token.
    #[error("could not parse token response: {0}")]
    MalformedResponse(String),

    /// The exchange never reached the token endpoint.
    #[error("token exchange failed: {0}")]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display() {
        let err = AuthError::Rejected {
            status: 401,
            body: "invalid_client".into(),
        };
        assert_eq!(
            err.to_string(),
            "token exchange rejected (status 401): invalid_client"
        );
    }

    #[test]
    fn interrupted_display() {
        assert_eq!(
            TransportError::Interrupted.to_string(),
            "wait interrupted before the next attempt"
        );
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TransportError>();
        assert_send_sync::<AuthError>();
    }
}
