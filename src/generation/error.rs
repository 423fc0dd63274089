use thiserror::Error;

use crate::http::TransportError;

/// Failures of the create/poll protocol.
///
/// A poll budget running out is not an error; it is reported as
/// [`PollState::Timeout`](super::PollState::Timeout).
#[derive(Debug, Error)]
pub enum JobError {
    /// The service answered with a status that is neither 2xx nor "not ready".
    #[error("generation service returned status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("could not parse generation response: {0}")]
    MalformedResponse(String),

    #[error("generation response did not include a task id")]
    MissingTaskId,

    #[error("generation was cancelled")]
    Cancelled,

    #[error("generation request failed: {0}")]
    Transport(#[from] TransportError),
}
