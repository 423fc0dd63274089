use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::JobError;
use super::types::{GenerationOutcome, JobHandle, JobStatus, PollState};

const SUCCESS_WORDS: &[&str] = &["succeeded", "success"];
const FAILURE_WORDS: &[&str] = &["failed", "error"];

/// Configuration of the polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait between two status requests.
    pub interval: Duration,
    /// Number of "still processing" answers tolerated before giving up.
    pub max_attempts: u32,
    /// Wall-clock bound on the whole loop, "not ready" answers included.
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_attempts: 20,
            deadline: Some(Duration::from_secs(120)),
        }
    }
}

/// What one status request told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollObservation {
    /// HTTP 202: the task exists but has nothing to report yet.
    NotReady,
    Status(JobStatus),
}

/// The result of feeding one observation into a [`PollTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Keep polling. `consumed` tells whether the attempt budget shrank.
    Wait { consumed: bool },
    /// Stop polling.
    Terminal(PollState),
}

/// Drives one job from `PENDING` to a terminal [`PollState`].
///
/// - An observation carrying audio is `SUCCEEDED`, whatever its state text.
/// - Otherwise success vocabulary is `SUCCEEDED` and failure vocabulary is `FAILED`.
/// - Any other text consumes one attempt; an empty budget is `TIMEOUT`.
/// - "Not ready" answers never consume the budget.
#[derive(Debug, Clone)]
pub struct PollTracker {
    state: PollState,
    attempts_used: u32,
    max_attempts: u32,
    requests: u32,
    last: JobStatus,
}

impl PollTracker {
    pub fn new(handle: &JobHandle, max_attempts: u32) -> Self {
        Self {
            state: PollState::Pending,
            attempts_used: 0,
            max_attempts,
            requests: 0,
            last: JobStatus {
                task_id: handle.task_id.clone(),
                state: handle.initial_status.clone(),
                audio_url: None,
            },
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    pub fn observe(&mut self, observation: PollObservation) -> Transition {
        if self.state.is_terminal() {
            return Transition::Terminal(self.state);
        }
        self.requests += 1;

        let status = match observation {
            PollObservation::NotReady => return Transition::Wait { consumed: false },
            PollObservation::Status(status) => status,
        };
        self.last = status;

        if let Some(terminal) = classify(&self.last) {
            self.state = terminal;
            return Transition::Terminal(terminal);
        }

        self.attempts_used += 1;
        if self.attempts_used >= self.max_attempts {
            self.state = PollState::Timeout;
            return Transition::Terminal(PollState::Timeout);
        }
        Transition::Wait { consumed: true }
    }

    /// Stop polling because time ran out.
    pub fn expire(&mut self) -> PollState {
        if !self.state.is_terminal() {
            self.state = if self.last.has_audio() {
                PollState::Succeeded
            } else {
                PollState::Timeout
            };
        }
        self.state
    }

    pub fn outcome(&self) -> GenerationOutcome {
        GenerationOutcome {
            task_id: self.last.task_id.clone(),
            state: self.state,
            status_text: self.last.state.clone(),
            audio_url: self.last.audio_url.clone(),
            poll_requests: self.requests,
        }
    }
}

fn classify(status: &JobStatus) -> Option<PollState> {
    if status.has_audio() {
        return Some(PollState::Succeeded);
    }
    let lower = status.state.to_lowercase();
    if SUCCESS_WORDS.iter().any(|w| lower.contains(w)) {
        return Some(PollState::Succeeded);
    }
    if FAILURE_WORDS.iter().any(|w| lower.contains(w)) {
        return Some(PollState::Failed);
    }
    None
}

/// Anything that can answer "how is task X doing?".
pub trait StatusSource {
    fn fetch_status(
        &self,
        task_id: &str,
    ) -> impl Future<Output = Result<PollObservation, JobError>> + Send;
}

/// Poll `source` until the job reaches a terminal state.
///
/// Cancellation is checked at the top of every iteration and interrupts the
/// wait between requests; an in-flight request always runs to completion.
pub async fn poll_until_terminal<S: StatusSource>(
    source: &S,
    handle: &JobHandle,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<GenerationOutcome, JobError> {
    if handle.is_terminal() {
        return Ok(GenerationOutcome::immediate(handle));
    }

    let started = Instant::now();
    let mut tracker = PollTracker::new(handle, policy.max_attempts);

    loop {
        if cancel.is_cancelled() {
            info!(task_id = %handle.task_id, "polling cancelled");
            return Err(JobError::Cancelled);
        }

        let observation = source.fetch_status(&handle.task_id).await?;
        match tracker.observe(observation) {
            Transition::Terminal(state) => {
                info!(task_id = %handle.task_id, %state, "job reached terminal state");
                return Ok(tracker.outcome());
            }
            Transition::Wait { consumed } => {
                debug!(
                    task_id = %handle.task_id,
                    consumed,
                    attempts_used = tracker.attempts_used(),
                    max_attempts = policy.max_attempts,
                    "job still pending"
                );
            }
        }

        if policy.deadline.is_some_and(|d| started.elapsed() >= d) {
            let state = tracker.expire();
            info!(task_id = %handle.task_id, %state, "poll deadline reached");
            return Ok(tracker.outcome());
        }

        tokio::select! {
            _ = sleep(policy.interval) => {}
            _ = cancel.cancelled() => {
                info!(task_id = %handle.task_id, "polling cancelled while waiting");
                return Err(JobError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays a fixed list of answers, then keeps saying "processing".
    struct Scripted {
        answers: Mutex<VecDeque<Result<PollObservation, JobError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(answers: Vec<Result<PollObservation, JobError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StatusSource for Scripted {
        async fn fetch_status(&self, task_id: &str) -> Result<PollObservation, JobError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.answers.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(status(task_id, "processing", None)))
        }
    }

    fn status(task_id: &str, state: &str, audio: Option<&str>) -> PollObservation {
        PollObservation::Status(JobStatus {
            task_id: task_id.to_string(),
            state: state.to_string(),
            audio_url: audio.map(str::to_string),
        })
    }

    fn handle() -> JobHandle {
        JobHandle {
            task_id: "t1".into(),
            initial_status: "submitted".into(),
            audio_url: None,
        }
    }

    fn fast(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts,
            deadline: None,
        }
    }

    #[test]
    fn not_ready_does_not_consume_budget() {
        let mut tracker = PollTracker::new(&handle(), 1);
        assert_eq!(
            tracker.observe(PollObservation::NotReady),
            Transition::Wait { consumed: false }
        );
        assert_eq!(
            tracker.observe(PollObservation::NotReady),
            Transition::Wait { consumed: false }
        );
        assert_eq!(tracker.attempts_used(), 0);
        assert_eq!(tracker.state(), PollState::Pending);
    }

    #[test]
    fn processing_consumes_budget_until_timeout() {
        let mut tracker = PollTracker::new(&handle(), 2);
        assert_eq!(
            tracker.observe(status("t1", "processing", None)),
            Transition::Wait { consumed: true }
        );
        assert_eq!(
            tracker.observe(status("t1", "processing", None)),
            Transition::Terminal(PollState::Timeout)
        );
        let outcome = tracker.outcome();
        assert_eq!(outcome.state, PollState::Timeout);
        assert_eq!(outcome.status_text, "processing");
    }

    #[test]
    fn audio_overrides_failure_text() {
        let mut tracker = PollTracker::new(&handle(), 5);
        let t = tracker.observe(status("t1", "failed", Some("https://cdn/x.mp3")));
        assert_eq!(t, Transition::Terminal(PollState::Succeeded));
        assert_eq!(tracker.outcome().audio_url.as_deref(), Some("https://cdn/x.mp3"));
    }

    #[test]
    fn audio_on_final_attempt_beats_budget() {
        let mut tracker = PollTracker::new(&handle(), 1);
        let t = tracker.observe(status("t1", "processing", Some("https://cdn/y.mp3")));
        assert_eq!(t, Transition::Terminal(PollState::Succeeded));
    }

    #[test]
    fn vocabulary_classification() {
        let cases = [
            ("SUCCEEDED", Some(PollState::Succeeded)),
            ("success", Some(PollState::Succeeded)),
            ("Failed", Some(PollState::Failed)),
            ("internal error", Some(PollState::Failed)),
            ("running", None),
            ("", None),
        ];
        for (text, expected) in cases {
            let s = JobStatus {
                task_id: "t".into(),
                state: text.into(),
                audio_url: None,
            };
            assert_eq!(classify(&s), expected, "state text {text:?}");
        }
    }

    #[test]
    fn terminal_tracker_ignores_further_observations() {
        let mut tracker = PollTracker::new(&handle(), 3);
        tracker.observe(status("t1", "failed", None));
        assert_eq!(
            tracker.observe(status("t1", "succeeded", Some("x"))),
            Transition::Terminal(PollState::Failed)
        );
    }

    #[tokio::test]
    async fn not_ready_then_processing_then_success() {
        let source = Scripted::new(vec![
            Ok(PollObservation::NotReady),
            Ok(PollObservation::NotReady),
            Ok(status("t1", "processing", None)),
            Ok(status("t1", "succeeded", Some("X"))),
        ]);

        let outcome = poll_until_terminal(&source, &handle(), &fast(2), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.state, PollState::Succeeded);
        assert_eq!(outcome.audio_url.as_deref(), Some("X"));
        assert_eq!(outcome.poll_requests, 4);
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn exhausting_budget_yields_timeout() {
        let source = Scripted::new(vec![]);
        let outcome = poll_until_terminal(&source, &handle(), &fast(3), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.state, PollState::Timeout);
        assert!(outcome.audio_url.is_none());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn failure_text_is_terminal_failed() {
        let source = Scripted::new(vec![Ok(status("t1", "error: bad prompt", None))]);
        let outcome = poll_until_terminal(&source, &handle(), &fast(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.state, PollState::Failed);
        assert_eq!(outcome.status_text, "error: bad prompt");
    }

    #[tokio::test]
    async fn job_error_propagates_without_retry() {
        let source = Scripted::new(vec![
            Ok(status("t1", "processing", None)),
            Err(JobError::Rejected {
                status: 500,
                body: "boom".into(),
            }),
        ]);
        let err = poll_until_terminal(&source, &handle(), &fast(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Rejected { status: 500, .. }));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_request() {
        let source = Scripted::new(vec![]);
        let token = CancellationToken::new();
        token.cancel();
        let err = poll_until_terminal(&source, &handle(), &fast(5), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Cancelled));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_wait() {
        let source = Scripted::new(vec![]);
        let token = CancellationToken::new();
        let policy = PollPolicy {
            interval: Duration::from_secs(60),
            max_attempts: 10,
            deadline: None,
        };

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = poll_until_terminal(&source, &handle(), &policy, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Cancelled));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn deadline_bounds_endless_not_ready() {
        let answers = (0..1000).map(|_| Ok(PollObservation::NotReady)).collect();
        let source = Scripted::new(answers);
        let policy = PollPolicy {
            interval: Duration::from_millis(5),
            max_attempts: 3,
            deadline: Some(Duration::from_millis(50)),
        };

        let outcome = poll_until_terminal(&source, &handle(), &policy, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.state, PollState::Timeout);
        assert!(source.calls() < 1000);
    }

    #[tokio::test]
    async fn terminal_handle_skips_polling() {
        let source = Scripted::new(vec![]);
        let handle = JobHandle {
            task_id: "t9".into(),
            initial_status: "success".into(),
            audio_url: Some("https://cdn/now.mp3".into()),
        };
        let outcome = poll_until_terminal(&source, &handle, &fast(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.state, PollState::Succeeded);
        assert_eq!(outcome.poll_requests, 0);
        assert_eq!(source.calls(), 0);
    }
}
