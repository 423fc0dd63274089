//! Saving and restoring a search session as a JSON document.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{Track, UserQuery};
use crate::error::MuseError;

/// A query together with the tracks it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub query: UserQuery,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(query: UserQuery, tracks: Vec<Track>) -> Self {
        Self {
            query,
            tracks,
            saved_at: None,
        }
    }
}

pub struct SessionStore;

impl SessionStore {
    /// Write `session` to `path`, stamping the save time.
    pub fn save(session: &Session, path: &Path) -> Result<(), MuseError> {
        if session.query.is_blank() || session.tracks.is_empty() {
            return Err(MuseError::NothingToSave);
        }
        let stamped = Session {
            saved_at: Some(Utc::now()),
            ..session.clone()
        };
        let json = serde_json::to_string_pretty(&stamped)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), tracks = stamped.tracks.len(), "session saved");
        Ok(())
    }

    /// Read a session back. An empty file holds no session.
    pub fn load(path: &Path) -> Result<Option<Session>, MuseError> {
        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        let session = serde_json::from_str(&contents)?;
        Ok(Some(session))
    }
}
