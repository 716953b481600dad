//! # aqualoop
//!
//! Application layer of the AquaLoop treatment simulator: the HTTP
//! prediction client, configuration, CLI, REST API and submission queue
//! around `aqualoop-core`.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod queue;

pub use client::PredictionClient;
pub use config::Config;
pub use error::AppError;
