//! Terminal rendering: spinners and coloured output.
//!
//! Uses `indicatif` for the progress spinner and `console` for colours.
//! Everything here runs on the interactive thread.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::Track;
use crate::generation::{GenerationOutcome, PollState};
use crate::orchestrator::SearchResult;
use crate::session::Session;

/// Spinner shown while a background operation runs.
pub struct Progress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl Progress {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    pub fn finish_search(&self, result: &SearchResult) {
        self.pb.finish_and_clear();
        if result.tracks.is_empty() {
            println!("  {} No tracks found", self.yellow.apply_to("•"));
            return;
        }
        println!(
            "  {} {} tracks ({} mode)",
            self.green.apply_to("✓"),
            result.tracks.len(),
            result.mode
        );
        print_tracks(&result.tracks, &self.dim);
    }

    pub fn finish_generation(&self, outcome: &GenerationOutcome) {
        self.pb.finish_and_clear();
        let polls = self
            .dim
            .apply_to(format!("({} status requests)", outcome.poll_requests));
        match (outcome.state, outcome.audio_url.as_deref()) {
            (PollState::Succeeded, Some(url)) => {
                println!("  {} Track ready: {url} {polls}", self.green.apply_to("✓"))
            }
            (PollState::Succeeded, None) => println!(
                "  {} Generation succeeded without audio {polls}",
                self.yellow.apply_to("•")
            ),
            (PollState::Timeout, _) => println!(
                "  {} Timed out waiting for task {} {polls}",
                self.yellow.apply_to("…"),
                outcome.task_id
            ),
            (state, _) => println!(
                "  {} Generation {state}: {} {polls}",
                self.red.apply_to("✗"),
                outcome.status_text
            ),
        }
    }

    pub fn cancelled(&self) {
        self.pb.finish_and_clear();
        println!("  {} Cancelled", self.yellow.apply_to("↺"));
    }

    pub fn error(&self, message: &str) {
        self.pb.finish_and_clear();
        eprintln!("  {} {message}", self.red.apply_to("✗"));
    }

    /// Print above the spinner without disturbing it.
    pub fn note(&self, message: &str) {
        self.pb.println(format!("  {}", self.dim.apply_to(message)));
    }
}

fn print_tracks(tracks: &[Track], dim: &Style) {
    for (i, track) in tracks.iter().enumerate() {
        println!("  {:>2}. {track}", i + 1);
        if let Some(url) = &track.preview_url {
            println!("      {}", dim.apply_to(url));
        }
    }
}

pub fn print_session(session: &Session) {
    let header = Style::new().cyan().bold();
    let dim = Style::new().dim();
    println!("{}", header.apply_to("─── Session ───"));
    if let Some(saved_at) = session.saved_at {
        println!("  saved  {}", dim.apply_to(saved_at.to_rfc3339()));
    }
    let q = &session.query;
    for (label, value) in [
        ("text", &q.text),
        ("mood", &q.mood),
        ("genre", &q.genre),
        ("artist", &q.artist),
    ] {
        if let Some(value) = value {
            println!("  {label:<6} {value}");
        }
    }
    print_tracks(&session.tracks, &dim);
}
