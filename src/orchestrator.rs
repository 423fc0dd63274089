use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::catalog::{CatalogClient, RecommendationMode};
use crate::config::MuseConfig;
use crate::domain::{Track, UserQuery};
use crate::error::MuseError;
use crate::generation::{GenerationOutcome, SonicClient};
use crate::http::{CredentialCache, HttpGateway, TransportError};
use crate::runner::{TaskEvent, TaskHandle, TaskRunner};
use crate::session::{Session, SessionStore};

/// Tracks found for a query, as delivered by a background search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub query: UserQuery,
    pub mode: RecommendationMode,
    pub tracks: Vec<Track>,
}

/// What the user is currently looking at.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub last_query: Option<UserQuery>,
    pub tracks: Vec<Track>,
    pub last_generation: Option<GenerationOutcome>,
}

/// Owns the shared services and runs searches and generations off the
/// interactive thread.
pub struct Orchestrator {
    config: MuseConfig,
    gateway: HttpGateway,
    catalog: CatalogClient,
    searches: TaskRunner<SearchResult>,
    generations: TaskRunner<GenerationOutcome>,
    state: Mutex<AppState>,
}

fn lock(state: &Mutex<AppState>) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Orchestrator {
    /// Build the services from `config`. Credentials are checked on first use.
    pub fn new(config: MuseConfig) -> Result<Self, MuseError> {
        let gateway = config.build_gateway()?;
        let credentials = CredentialCache::new(
            gateway.clone(),
            config.spotify.token_url.clone(),
            config.spotify.client_id.clone(),
            config.spotify.client_secret.clone(),
        )
        .with_safety_margin(Duration::from_secs(config.spotify.token_margin_secs));
        let catalog = CatalogClient::new(
            gateway.clone(),
            Arc::new(credentials),
            config.spotify.api_base.clone(),
        );

        Ok(Self {
            config,
            gateway,
            catalog,
            searches: TaskRunner::new(),
            generations: TaskRunner::new(),
            state: Mutex::new(AppState::default()),
        })
    }

    pub fn subscribe_searches(&self) -> UnboundedReceiver<TaskEvent<SearchResult>> {
        self.searches.subscribe()
    }

    pub fn subscribe_generations(&self) -> UnboundedReceiver<TaskEvent<GenerationOutcome>> {
        self.generations.subscribe()
    }

    /// Search tracks for `query` in the background.
    pub fn request_recommendations(
        &self,
        query: UserQuery,
        mode: RecommendationMode,
    ) -> TaskHandle<SearchResult> {
        let catalog = self.catalog.clone();
        debug!(%mode, ?query, "recommendations requested");
        self.searches.submit(move |cancel| async move {
            let tracks = tokio::select! {
                result = catalog.recommend(&query, mode) => result?,
                _ = cancel.cancelled() => {
                    return Err(MuseError::Transport(TransportError::Interrupted));
                }
            };
            Ok::<_, MuseError>(SearchResult { query, mode, tracks })
        })
    }

    /// Generate an instrumental for `query` in the background. Missing
    /// generation settings surface as the operation's error.
    pub fn request_generation(&self, query: UserQuery) -> TaskHandle<GenerationOutcome> {
        let client = self.generation_client();
        debug!(?query, "generation requested");
        self.generations.submit(move |cancel| async move {
            let client = client?;
            let outcome = client.generate(&query, &cancel).await?;
            Ok::<_, MuseError>(outcome)
        })
    }

    pub fn cancel_generation(&self) -> bool {
        self.generations.cancel()
    }

    fn generation_client(&self) -> Result<SonicClient, MuseError> {
        let (base_url, api_key) = self.config.require_suno()?;
        Ok(SonicClient::new(
            self.gateway.clone(),
            base_url,
            api_key,
            self.config.suno.model.clone(),
            self.config.poll_policy(),
        ))
    }

    /// Make a finished search the current one.
    pub fn record_search(&self, result: &SearchResult) {
        let mut state = lock(&self.state);
        state.last_query = Some(result.query.clone());
        state.tracks = result.tracks.clone();
    }

    pub fn record_generation(&self, outcome: &GenerationOutcome) {
        lock(&self.state).last_generation = Some(outcome.clone());
    }

    pub fn state(&self) -> AppState {
        lock(&self.state).clone()
    }

    /// Save the current query and tracks to `path`.
    pub fn save_session(&self, path: &Path) -> Result<(), MuseError> {
        let session = {
            let state = lock(&self.state);
            let query = state.last_query.clone().ok_or(MuseError::NothingToSave)?;
            Session::new(query, state.tracks.clone())
        };
        SessionStore::save(&session, path)
    }

    /// Load a session from `path` and make it current.
    pub fn load_session(&self, path: &Path) -> Result<Option<Session>, MuseError> {
        let loaded = SessionStore::load(path)?;
        if let Some(session) = &loaded {
            let mut state = lock(&self.state);
            state.last_query = Some(session.query.clone());
            state.tracks = session.tracks.clone();
            info!(path = %path.display(), tracks = session.tracks.len(), "session restored");
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::PollState;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEARCH_BODY: &str = r#"{
      "tracks": { "items": [
        { "id": "t1", "name": "Night Drive", "album": { "name": "Roads" }, "artists": [ { "name": "Neon" } ] }
      ] }
    }"#;

    fn test_config(server: &MockServer) -> MuseConfig {
        let mut config = MuseConfig::default();
        config.api.backoff_ms = 1;
        config.api.timeout_ms = 500;
        config.spotify.client_id = Some("id".into());
        config.spotify.client_secret = Some("secret".into());
        config.spotify.token_url = format!("{}/api/token", server.uri());
        config.spotify.api_base = format!("{}/v1", server.uri());
        config.suno.base_url = Some(server.uri());
        config.suno.api_key = Some("key".into());
        config.suno.poll_interval_ms = 5;
        config
    }

    async fn mount_catalog(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "expires_in": 3600
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("query", "calm"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_BODY))
            .mount(server)
            .await;
    }

    fn last_event<T>(rx: &mut UnboundedReceiver<TaskEvent<T>>) -> Option<TaskEvent<T>> {
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        last
    }

    #[tokio::test]
    async fn search_result_can_be_recorded_and_saved() {
        let server = MockServer::start().await;
        mount_catalog(&server).await;
        let orch = Orchestrator::new(test_config(&server)).unwrap();
        let mut rx = orch.subscribe_searches();

        let query = UserQuery::new(Some("late night"), Some("calm"), None, None);
        orch.request_recommendations(query.clone(), RecommendationMode::Mood)
            .wait()
            .await;

        let Some(TaskEvent::Completed { result, .. }) = last_event(&mut rx) else {
            panic!("expected a completed search");
        };
        assert_eq!(result.query, query);
        assert_eq!(result.tracks[0].name, "Night Drive");
        orch.record_search(&result);

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("session.json");
        orch.save_session(&file).unwrap();
        let saved = SessionStore::load(&file).unwrap().unwrap();
        assert_eq!(saved.tracks.len(), 1);
        assert_eq!(saved.query, query);
    }

    #[tokio::test]
    async fn saving_before_any_search_is_refused() {
        let server = MockServer::start().await;
        let orch = Orchestrator::new(test_config(&server)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            orch.save_session(&dir.path().join("s.json")),
            Err(MuseError::NothingToSave)
        ));
    }

    #[tokio::test]
    async fn missing_catalog_credentials_are_reported_as_error() {
        let server = MockServer::start().await;
        let mut config = test_config(&server);
        config.spotify.client_secret = None;
        let orch = Orchestrator::new(config).unwrap();
        let mut rx = orch.subscribe_searches();

        orch.request_recommendations(UserQuery::from_text("calm"), RecommendationMode::Mood)
            .wait()
            .await;

        match last_event(&mut rx) {
            Some(TaskEvent::Error { message, .. }) => {
                assert!(message.contains("credentials"), "{message}")
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_generation_settings_are_reported_as_error() {
        let server = MockServer::start().await;
        let mut config = test_config(&server);
        config.suno.api_key = None;
        let orch = Orchestrator::new(config).unwrap();
        let mut rx = orch.subscribe_generations();

        orch.request_generation(UserQuery::from_text("x")).wait().await;

        match last_event(&mut rx) {
            Some(TaskEvent::Error { message, .. }) => assert!(message.contains("suno.api_key")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generation_completes_with_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/sonic/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "job-1",
                "message": "submitted"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/sonic/task/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [ { "state": "succeeded", "audio_url": "https://cdn/x.mp3" } ]
            })))
            .mount(&server)
            .await;

        let orch = Orchestrator::new(test_config(&server)).unwrap();
        let mut rx = orch.subscribe_generations();
        orch.request_generation(UserQuery::from_text("rain")).wait().await;

        let Some(TaskEvent::Completed { result, .. }) = last_event(&mut rx) else {
            panic!("expected a completed generation");
        };
        assert_eq!(result.state, PollState::Succeeded);
        assert_eq!(result.audio_url.as_deref(), Some("https://cdn/x.mp3"));
        orch.record_generation(&result);
        assert_eq!(orch.state().last_generation, Some(result));
    }

    #[tokio::test]
    async fn cancelled_generation_reports_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/sonic/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "job-2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/sonic/task/job-2"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let orch = Orchestrator::new(test_config(&server)).unwrap();
        let mut rx = orch.subscribe_generations();
        let handle = orch.request_generation(UserQuery::from_text("rain"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(orch.cancel_generation());
        handle.wait().await;

        assert!(matches!(last_event(&mut rx), Some(TaskEvent::Cancelled { .. })));
        assert!(!orch.cancel_generation());
    }

    #[tokio::test]
    async fn loading_a_session_makes_it_current() {
        let server = MockServer::start().await;
        let orch = Orchestrator::new(test_config(&server)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("s.json");
        let session = Session::new(
            UserQuery::from_text("focus"),
            vec![Track {
                id: Some("a".into()),
                name: "Deep".into(),
                artist: "Mono".into(),
                album: "Work".into(),
                preview_url: None,
            }],
        );
        SessionStore::save(&session, &file).unwrap();

        let loaded = orch.load_session(&file).unwrap().unwrap();
        assert_eq!(loaded.query, session.query);
        let state = orch.state();
        assert_eq!(state.last_query, Some(session.query));
        assert_eq!(state.tracks.len(), 1);
    }
}
