//! # Application Errors
//!
//! Failures of the binary: configuration, I/O, serving, and the core
//! pipeline errors surfaced through the CLI.

use aqualoop_core::{GradingError, PersistenceError, SimulationError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("unknown industry profile '{0}'")]
    UnknownProfile(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Grading(#[from] GradingError),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}
