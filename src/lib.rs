pub mod catalog;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod generation;
pub mod http;
pub mod orchestrator;
pub mod runner;
pub mod session;
pub mod ui;

pub use error::MuseError;
