use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::UserQuery;
use crate::http::HttpGateway;

use super::error::JobError;
use super::poller::{PollObservation, PollPolicy, StatusSource, poll_until_terminal};
use super::types::{
    CreateTaskRequest, CreateTaskResponse, GenerationOutcome, JobHandle, JobStatus,
    TaskStatusResponse,
};

const DEFAULT_PROMPT: &str = "Chill instrumental background music";
const DEFAULT_TAGS: &str = "instrumental";
const DEFAULT_TITLE: &str = "MuseMix Instrumental";
const NOT_READY: u16 = 202;

/// Client for the instrumental generation service (create + task status).
#[derive(Debug, Clone)]
pub struct SonicClient {
    gateway: HttpGateway,
    base_url: String,
    api_key: String,
    model: String,
    poll: PollPolicy,
}

impl SonicClient {
    pub fn new(
        gateway: HttpGateway,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        poll: PollPolicy,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            gateway,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            poll,
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    /// Create a generation task and return its handle.
    pub async fn submit(&self, query: &UserQuery) -> Result<JobHandle, JobError> {
        let url = format!("{}/api/v1/sonic/create", self.base_url);
        let body = build_request(query, &self.model);

        let response = self
            .gateway
            .post_json_with_retry(&url, &body, Some(&self.bearer()))
            .await?;

        if !response.is_success() {
            warn!(status = response.status, "create call rejected");
            return Err(JobError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        let parsed: CreateTaskResponse = response
            .json()
            .map_err(|e| JobError::MalformedResponse(format!("{e}: {}", response.body)))?;
        let handle = JobHandle::from_response(parsed).ok_or(JobError::MissingTaskId)?;

        info!(
            task_id = %handle.task_id,
            status = %handle.initial_status,
            immediate = handle.is_terminal(),
            "generation task submitted"
        );
        Ok(handle)
    }

    /// Submit and then poll until the job is terminal.
    pub async fn generate(
        &self,
        query: &UserQuery,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome, JobError> {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let handle = self.submit(query).await?;
        poll_until_terminal(self, &handle, &self.poll, cancel).await
    }
}

impl StatusSource for SonicClient {
    async fn fetch_status(&self, task_id: &str) -> Result<PollObservation, JobError> {
        let url = format!("{}/api/v1/sonic/task/{task_id}", self.base_url);
        let response = self
            .gateway
            .get_with_retry(&url, Some(&self.bearer()))
            .await?;

        if response.status == NOT_READY {
            return Ok(PollObservation::NotReady);
        }
        if !response.is_success() {
            warn!(status = response.status, %task_id, "status call rejected");
            return Err(JobError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        let parsed: TaskStatusResponse = response
            .json()
            .map_err(|e| JobError::MalformedResponse(format!("{e}: {}", response.body)))?;
        Ok(PollObservation::Status(JobStatus::from_response(
            task_id, parsed,
        )))
    }
}

/// Assemble the create body for `query`.
pub fn build_request(query: &UserQuery, model: &str) -> CreateTaskRequest {
    CreateTaskRequest {
        custom_mode: true,
        prompt: build_prompt(query),
        title: query
            .text
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        tags: build_tags(query),
        make_instrumental: true,
        mv: model.to_string(),
    }
}

/// Free text, mood and genre separated by blank lines.
pub fn build_prompt(query: &UserQuery) -> String {
    let mut sections = Vec::new();
    if let Some(text) = &query.text {
        sections.push(text.clone());
    }
    if let Some(mood) = &query.mood {
        sections.push(format!("Mood: {mood}"));
    }
    if let Some(genre) = &query.genre {
        sections.push(format!("Genre: {genre}"));
    }
    if sections.is_empty() {
        return DEFAULT_PROMPT.to_string();
    }
    sections.join("\n\n")
}

pub fn build_tags(query: &UserQuery) -> String {
    let tags: Vec<&str> = [query.genre.as_deref(), query.mood.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if tags.is_empty() {
        return DEFAULT_TAGS.to_string();
    }
    tags.join(", ")
}
