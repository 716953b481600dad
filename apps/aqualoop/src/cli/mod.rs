//! # AquaLoop CLI Module
//!
//! This module implements the CLI interface for AquaLoop.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `simulate` - Run the treatment pipeline for one influent sample
//! - `history` - List stored runs of an owner
//! - `trends` - Trend summary over an owner's runs
//! - `grade` - Reuse grade of a water sample
//! - `profiles` - List catalogued industries

mod commands;

use crate::config::Config;
use crate::error::AppError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// AquaLoop - treatment simulation for industrial water reuse
///
/// Pushes an influent sample through primary, secondary and tertiary
/// treatment using a remote prediction service.
#[derive(Parser, Debug)]
#[command(name = "aqualoop")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file (default: ./aqualoop.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Influent values given on the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct InfluentArgs {
    /// Biochemical oxygen demand (mg/L)
    #[arg(long)]
    pub bod: Option<f64>,

    /// Chemical oxygen demand (mg/L)
    #[arg(long)]
    pub cod: Option<f64>,

    /// pH
    #[arg(long)]
    pub ph: Option<f64>,

    /// Turbidity (NTU)
    #[arg(long)]
    pub turbidity: Option<f64>,

    /// Total suspended solids (mg/L)
    #[arg(long)]
    pub tss: Option<f64>,
}

/// Quality metrics given on the command line. Unset metrics take the
/// baseline sample's value.
#[derive(Args, Debug, Clone, Default)]
pub struct SampleArgs {
    /// pH
    #[arg(long)]
    pub ph: Option<f64>,

    /// Hardness (mg/L)
    #[arg(long)]
    pub hardness: Option<f64>,

    /// Total dissolved solids (ppm)
    #[arg(long)]
    pub solids: Option<f64>,

    /// Chloramines (ppm)
    #[arg(long)]
    pub chloramines: Option<f64>,

    /// Sulfate (mg/L)
    #[arg(long)]
    pub sulfate: Option<f64>,

    /// Conductivity (µS/cm)
    #[arg(long)]
    pub conductivity: Option<f64>,

    /// Organic carbon (ppm)
    #[arg(long)]
    pub organic_carbon: Option<f64>,

    /// Trihalomethanes (µg/L)
    #[arg(long)]
    pub trihalomethanes: Option<f64>,

    /// Turbidity (NTU)
    #[arg(long)]
    pub turbidity: Option<f64>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one simulation
    Simulate {
        /// Industry type sent to the prediction service
        #[arg(short, long)]
        industry: Option<String>,

        /// Start from a catalogued profile's default influent
        #[arg(long)]
        profile: Option<String>,

        /// Display name for an industry that is not catalogued
        #[arg(long)]
        manual_name: Option<String>,

        #[command(flatten)]
        influent: InfluentArgs,

        /// Owner to save the run for; without it the run is not saved
        #[arg(short, long)]
        owner: Option<String>,
    },

    /// List stored runs of an owner
    History {
        #[arg(short, long)]
        owner: String,
    },

    /// Show trend summary over an owner's runs
    Trends {
        #[arg(short, long)]
        owner: String,
    },

    /// Grade a water sample for reuse
    Grade {
        #[command(flatten)]
        sample: SampleArgs,
    },

    /// List catalogued industry profiles
    Profiles,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = Config::load(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    if cli.verbose {
        tracing::info!(
            prediction_url = %config.prediction.base_url,
            backend = ?config.storage.backend,
            storage = %config.storage.path.display(),
            "effective configuration"
        );
    }

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(config, host, port).await,
        Some(Commands::Simulate {
            industry,
            profile,
            manual_name,
            influent,
            owner,
        }) => {
            let request = SimulateArgs {
                industry,
                profile,
                manual_name,
                influent,
                owner,
            };
            cmd_simulate(&config, &request, json_mode).await
        }
        Some(Commands::History { owner }) => cmd_history(&config, &owner, json_mode),
        Some(Commands::Trends { owner }) => cmd_trends(&config, &owner, json_mode),
        Some(Commands::Grade { sample }) => cmd_grade(&config, &sample, json_mode).await,
        // No subcommand - list profiles by default
        Some(Commands::Profiles) | None => cmd_profiles(json_mode),
    }
}
