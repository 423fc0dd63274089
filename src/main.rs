use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;

use musemix::catalog::RecommendationMode;
use musemix::cli::{Cli, Command};
use musemix::config::MuseConfig;
use musemix::orchestrator::Orchestrator;
use musemix::runner::TaskEvent;
use musemix::ui::{Progress, print_session};

fn init_logging(verbose: bool) {
    let default = if verbose { "musemix=debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = MuseConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let orch = Orchestrator::new(config)?;
    let query = cli.command.query();

    match cli.command {
        Command::Search { mode, save, .. } => {
            let mode: RecommendationMode = mode.into();
            let mut events = orch.subscribe_searches();
            let progress = Progress::start(&format!("Searching tracks ({mode} mode)..."));
            orch.request_recommendations(query.unwrap_or_default(), mode);

            let Some(event) = next_terminal(&mut events).await else {
                return Ok(ExitCode::FAILURE);
            };
            match event {
                TaskEvent::Completed { result, .. } => {
                    progress.finish_search(&result);
                    orch.record_search(&result);
                    if let Some(path) = save {
                        orch.save_session(&path)?;
                        println!("  Saved to {}", path.display());
                    }
                }
                TaskEvent::Error { message, .. } => {
                    progress.error(&message);
                    return Ok(ExitCode::FAILURE);
                }
                _ => progress.cancelled(),
            }
        }
        Command::Generate { .. } => {
            let mut events = orch.subscribe_generations();
            let progress = Progress::start("Generating instrumental...");
            orch.request_generation(query.unwrap_or_default());

            let mut interrupted = false;
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(TaskEvent::Completed { result, .. }) => {
                            progress.finish_generation(&result);
                            orch.record_generation(&result);
                            break;
                        }
                        Some(TaskEvent::Error { message, .. }) => {
                            progress.error(&message);
                            return Ok(ExitCode::FAILURE);
                        }
                        Some(TaskEvent::Cancelled { .. }) => {
                            progress.cancelled();
                            return Ok(ExitCode::from(130));
                        }
                        Some(TaskEvent::Started { .. }) => {}
                        None => return Ok(ExitCode::FAILURE),
                    },
                    _ = tokio::signal::ctrl_c(), if !interrupted => {
                        interrupted = true;
                        progress.note("Cancelling...");
                        orch.cancel_generation();
                    }
                }
            }
        }
        Command::Session { file } => match orch.load_session(&file)? {
            Some(session) => print_session(&session),
            None => println!("{} holds no session", file.display()),
        },
    }

    Ok(ExitCode::SUCCESS)
}

async fn next_terminal<T>(events: &mut UnboundedReceiver<TaskEvent<T>>) -> Option<TaskEvent<T>> {
    while let Some(event) = events.recv().await {
        if event.is_terminal() {
            return Some(event);
        }
    }
    None
}
