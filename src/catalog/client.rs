use std::sync::Arc;

use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::{Track, UserQuery};
use crate::http::{CredentialCache, HttpGateway, TransportError};

use super::error::CatalogError;
use super::mode::RecommendationMode;

const PAGE_SIZE: &str = "10";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Option<Vec<TrackItem>>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    id: Option<String>,
    name: Option<String>,
    preview_url: Option<String>,
    album: Option<NamedRef>,
    artists: Option<Vec<NamedRef>>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: Option<String>,
}

/// Track search against the music catalog.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    gateway: HttpGateway,
    credentials: Arc<CredentialCache>,
    api_base: String,
}

impl CatalogClient {
    pub fn new(
        gateway: HttpGateway,
        credentials: Arc<CredentialCache>,
        api_base: impl Into<String>,
    ) -> Self {
        let api_base: String = api_base.into();
        Self {
            gateway,
            credentials,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Search tracks matching the query's free text. A blank query returns nothing.
    pub async fn search_tracks(&self, query: &UserQuery) -> Result<Vec<Track>, CatalogError> {
        let Some(text) = query.text.as_deref() else {
            return Ok(Vec::new());
        };

        let token = self.credentials.get_token().await?;
        let url = Url::parse_with_params(
            &format!("{}/search", self.api_base),
            &[
                ("offset", "0"),
                ("limit", PAGE_SIZE),
                ("query", text),
                ("type", "track"),
            ],
        )
        .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let response = self
            .gateway
            .get_with_retry(url.as_str(), Some(&format!("Bearer {token}")))
            .await?;
        if !response.is_success() {
            return Err(CatalogError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        let tracks = parse_tracks(&response.body)?;
        info!(query = %text, count = tracks.len(), "catalog search finished");
        Ok(tracks)
    }

    /// Search using the seed chosen by `mode`.
    pub async fn recommend(
        &self,
        query: &UserQuery,
        mode: RecommendationMode,
    ) -> Result<Vec<Track>, CatalogError> {
        match mode.seed(query) {
            Some(seed) => {
                debug!(%mode, %seed, "recommendation seed");
                self.search_tracks(&UserQuery::from_text(&seed)).await
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Extract tracks from a search response body.
///
/// Items without a name are skipped. Only the first artist is kept.
pub fn parse_tracks(body: &str) -> Result<Vec<Track>, CatalogError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| CatalogError::MalformedResponse(e.to_string()))?;

    let items = response
        .tracks
        .and_then(|page| page.items)
        .unwrap_or_default();

    let tracks = items
        .into_iter()
        .filter_map(|item| {
            let name = item.name?.trim().to_string();
            let artist = item
                .artists
                .into_iter()
                .flatten()
                .next()
                .and_then(|a| a.name)
                .unwrap_or_default();
            let album = item.album.and_then(|a| a.name).unwrap_or_default();
            Some(Track {
                id: item.id,
                name,
                artist: artist.trim().to_string(),
                album: album.trim().to_string(),
                preview_url: item.preview_url.map(|u| u.trim().to_string()),
            })
        })
        .collect();
    Ok(tracks)
}
