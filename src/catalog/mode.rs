use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::UserQuery;

/// How a recommendation search picks its search text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationMode {
    Mood,
    Genre,
    Artist,
}

type SeedFn = fn(&UserQuery) -> Option<&str>;

fn mood_seed(q: &UserQuery) -> Option<&str> {
    q.mood.as_deref()
}

fn genre_seed(q: &UserQuery) -> Option<&str> {
    q.genre.as_deref()
}

fn artist_seed(q: &UserQuery) -> Option<&str> {
    q.artist.as_deref()
}

const SEEDS: &[(RecommendationMode, SeedFn)] = &[
    (RecommendationMode::Mood, mood_seed),
    (RecommendationMode::Genre, genre_seed),
    (RecommendationMode::Artist, artist_seed),
];

impl RecommendationMode {
    /// The search text for `query`: the mode's field, or the free text when it is blank.
    pub fn seed(self, query: &UserQuery) -> Option<String> {
        SEEDS
            .iter()
            .find(|(mode, _)| *mode == self)
            .and_then(|(_, field)| field(query))
            .or(query.text.as_deref())
            .map(str::to_string)
    }
}

impl fmt::Display for RecommendationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationMode::Mood => write!(f, "mood"),
            RecommendationMode::Genre => write!(f, "genre"),
            RecommendationMode::Artist => write!(f, "artist"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_field_has_priority() {
        let q = UserQuery::new(Some("text"), Some("happy"), Some("jazz"), Some("Miles"));
        assert_eq!(RecommendationMode::Mood.seed(&q).as_deref(), Some("happy"));
        assert_eq!(RecommendationMode::Genre.seed(&q).as_deref(), Some("jazz"));
        assert_eq!(RecommendationMode::Artist.seed(&q).as_deref(), Some("Miles"));
    }

    #[test]
    fn falls_back_to_text() {
        let q = UserQuery::new(Some("study beats"), None, None, None);
        assert_eq!(
            RecommendationMode::Mood.seed(&q).as_deref(),
            Some("study beats")
        );
        assert_eq!(
            RecommendationMode::Artist.seed(&q).as_deref(),
            Some("study beats")
        );
    }

    #[test]
    fn blank_query_has_no_seed() {
        assert!(RecommendationMode::Genre.seed(&UserQuery::default()).is_none());
    }

    #[test]
    fn every_mode_has_a_seed_function() {
        for mode in [
            RecommendationMode::Mood,
            RecommendationMode::Genre,
            RecommendationMode::Artist,
        ] {
            assert!(SEEDS.iter().any(|(m, _)| *m == mode), "{mode} missing");
        }
    }
}
