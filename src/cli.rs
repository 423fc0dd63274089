//! Command line interface built on clap.
//!
//! Subcommands [`Command`] (search, generate, session) and global flags
//! (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::catalog::RecommendationMode;
use crate::domain::UserQuery;

/// MuseMix: music recommendations and instrumental generation.
#[derive(Debug, Parser)]
#[command(name = "musemix", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the TOML configuration file (default: ./musemix.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Recommendation mode accepted on the command line, mapped to [`RecommendationMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Mood,
    Genre,
    Artist,
}

impl From<ModeArg> for RecommendationMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Mood => RecommendationMode::Mood,
            ModeArg::Genre => RecommendationMode::Genre,
            ModeArg::Artist => RecommendationMode::Artist,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search tracks for a mood, genre or artist.
    Search {
        /// Free text, used when the selected field is empty.
        text: Option<String>,

        /// Which field seeds the search.
        #[arg(long, value_enum, default_value_t = ModeArg::Mood)]
        mode: ModeArg,

        #[arg(long)]
        mood: Option<String>,

        #[arg(long)]
        genre: Option<String>,

        #[arg(long)]
        artist: Option<String>,

        /// Save the query and results to this JSON file.
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Generate an instrumental track. Ctrl-C cancels.
    Generate {
        /// Description of the track.
        text: Option<String>,

        #[arg(long)]
        mood: Option<String>,

        #[arg(long)]
        genre: Option<String>,
    },

    /// Show a saved session.
    Session {
        file: PathBuf,
    },
}

impl Command {
    /// The query described by the subcommand's arguments, if it has one.
    pub fn query(&self) -> Option<UserQuery> {
        match self {
            Command::Search {
                text,
                mood,
                genre,
                artist,
                ..
            } => Some(UserQuery::new(
                text.as_deref(),
                mood.as_deref(),
                genre.as_deref(),
                artist.as_deref(),
            )),
            Command::Generate { text, mood, genre } => Some(UserQuery::new(
                text.as_deref(),
                mood.as_deref(),
                genre.as_deref(),
                None,
            )),
            Command::Session { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_search_subcommand() {
        let cli = Cli::parse_from([
            "musemix", "search", "rainy", "--mode", "genre", "--genre", " jazz ", "--save", "out.json",
        ]);
        let query = cli.command.query().unwrap();
        match cli.command {
            Command::Search { mode, save, .. } => {
                assert_eq!(mode, ModeArg::Genre);
                assert_eq!(save, Some(PathBuf::from("out.json")));
            }
            _ => panic!("expected Search command"),
        }
        assert_eq!(query.text.as_deref(), Some("rainy"));
        assert_eq!(query.genre.as_deref(), Some("jazz"));
        assert!(query.artist.is_none());
    }

    #[test]
    fn search_mode_defaults_to_mood() {
        let cli = Cli::parse_from(["musemix", "search", "--mood", "calm"]);
        assert!(matches!(
            cli.command,
            Command::Search {
                mode: ModeArg::Mood,
                ..
            }
        ));
    }

    #[test]
    fn cli_parses_generate_and_global_flags() {
        let cli = Cli::parse_from([
            "musemix",
            "generate",
            "--mood",
            "dreamy",
            "--config",
            "alt.toml",
            "-v",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        let query = cli.command.query().unwrap();
        assert!(query.text.is_none());
        assert_eq!(query.mood.as_deref(), Some("dreamy"));
    }

    #[test]
    fn cli_parses_session_subcommand() {
        let cli = Cli::parse_from(["musemix", "session", "saved.json"]);
        assert!(cli.command.query().is_none());
        assert!(matches!(cli.command, Command::Session { file } if file == PathBuf::from("saved.json")));
    }

    #[test]
    fn mode_arg_maps_to_recommendation_mode() {
        assert_eq!(RecommendationMode::from(ModeArg::Artist), RecommendationMode::Artist);
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
