use thiserror::Error;

use crate::http::{AuthError, TransportError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog search failed with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("could not parse catalog response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("catalog request failed: {0}")]
    Transport(#[from] TransportError),
}
