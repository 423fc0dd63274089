//! Value types shared by the catalog, generation and session layers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What the user asked for. Every field is trimmed; blank fields are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
}

fn normalize(value: Option<impl AsRef<str>>) -> Option<String> {
    value
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
}

impl UserQuery {
    pub fn new(
        text: Option<&str>,
        mood: Option<&str>,
        genre: Option<&str>,
        artist: Option<&str>,
    ) -> Self {
        Self {
            text: normalize(text),
            mood: normalize(mood),
            genre: normalize(genre),
            artist: normalize(artist),
        }
    }

    /// A query carrying only free text.
    pub fn from_text(text: &str) -> Self {
        Self::new(Some(text), None, None, None)
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_none() && self.mood.is_none() && self.genre.is_none() && self.artist.is_none()
    }
}

/// A catalog track. Two tracks are equal when their ids are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub preview_url: Option<String>,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} — {} ({})", self.name, self.artist, self.album)
    }
}
