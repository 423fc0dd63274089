use thiserror::Error;

use crate::catalog::CatalogError;
use crate::generation::JobError;
use crate::http::{AuthError, TransportError};

#[derive(Debug, Error)]
pub enum MuseError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Nothing to save: perform a search first.")]
    NothingToSave,

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Network error: {0}")]
    Transport(#[from] TransportError),

    #[error("Generation error: {0}")]
    Job(#[from] JobError),

    #[error("Search error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
