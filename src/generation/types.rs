//! Wire and value types for the instrumental generation service.
//!
//! The `*Request`/`*Response` structs mirror the JSON exchanged with
//! `/api/v1/sonic/create` and `/api/v1/sonic/task/{task_id}`. [`JobHandle`],
//! [`JobStatus`] and [`GenerationOutcome`] are the values passed between the
//! submission step, the polling state machine and the task runner.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/sonic/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub custom_mode: bool,
    pub prompt: String,
    pub title: String,
    pub tags: String,
    pub make_instrumental: bool,
    /// Model version.
    pub mv: String,
}

/// One entry of the `data` array returned by the service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskItem {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// Response of `POST /api/v1/sonic/create`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTaskResponse {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<TaskItem>>,
}

/// Response of `GET /api/v1/sonic/task/{task_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskStatusResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<TaskItem>>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Identifies a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub task_id: String,
    pub initial_status: String,
    pub audio_url: Option<String>,
}

impl JobHandle {
    /// Build a handle from a create response. `None` when no task id was returned.
    pub fn from_response(response: CreateTaskResponse) -> Option<Self> {
        let task_id = non_empty(response.task_id)?;
        let first = response.data.into_iter().flatten().next().unwrap_or_default();
        let audio_url = non_empty(response.audio_url).or_else(|| non_empty(first.audio_url));
        Some(Self {
            task_id,
            initial_status: response
                .message
                .unwrap_or_else(|| "submitted".to_string()),
            audio_url,
        })
    }

    /// An audio URL at submission time means there is nothing to poll.
    pub fn is_terminal(&self) -> bool {
        self.audio_url.is_some()
    }
}

/// A single poll observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub task_id: String,
    pub state: String,
    pub audio_url: Option<String>,
}

impl JobStatus {
    /// State comes from `data[0].state`, falling back to the top-level message.
    pub fn from_response(task_id: &str, response: TaskStatusResponse) -> Self {
        let first = response.data.into_iter().flatten().next().unwrap_or_default();
        Self {
            task_id: task_id.to_string(),
            state: first.state.or(response.message).unwrap_or_default(),
            audio_url: non_empty(first.audio_url),
        }
    }

    pub fn has_audio(&self) -> bool {
        self.audio_url.is_some()
    }
}

/// Classification of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    Pending,
    Succeeded,
    Failed,
    Timeout,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PollState::Pending)
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::Pending => write!(f, "PENDING"),
            PollState::Succeeded => write!(f, "SUCCEEDED"),
            PollState::Failed => write!(f, "FAILED"),
            PollState::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Final result of submit + poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub task_id: String,
    pub state: PollState,
    /// Status text reported by the service on the last observation.
    pub status_text: String,
    pub audio_url: Option<String>,
    /// Status requests issued, including "not ready" answers.
    pub poll_requests: u32,
}

impl GenerationOutcome {
    /// Outcome of a job whose create response already carried audio.
    pub fn immediate(handle: &JobHandle) -> Self {
        Self {
            task_id: handle.task_id.clone(),
            state: PollState::Succeeded,
            status_text: handle.initial_status.clone(),
            audio_url: handle.audio_url.clone(),
            poll_requests: 0,
        }
    }
}
