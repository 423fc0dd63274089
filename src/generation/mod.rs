pub mod client;
pub mod error;
pub mod poller;
pub mod types;

pub use client::SonicClient;
pub use error::JobError;
pub use poller::{
    PollObservation, PollPolicy, PollTracker, StatusSource, Transition, poll_until_terminal,
};
pub use types::{GenerationOutcome, JobHandle, JobStatus, PollState};
