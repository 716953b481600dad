//! # AquaLoop - Treatment Simulation Server
//!
//! The main binary for the AquaLoop treatment simulation pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    apps/aqualoop (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐    │
//! │  │   CLI       │    │   HTTP API  │    │ Prediction client│    │
//! │  │  (clap)     │    │   (axum)    │    │    (reqwest)     │    │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘    │
//! │         │                  │                    │              │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │                    ┌───────────────┐                           │
//! │                    │ aqualoop-core │                           │
//! │                    │  (THE LOGIC)  │                           │
//! │                    └───────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! aqualoop server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! aqualoop profiles
//! aqualoop simulate --profile textile --owner plant-7
//! aqualoop history --owner plant-7
//! ```

use aqualoop::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // AQUALOOP_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("AQUALOOP_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "aqualoop=info,aqualoop_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the AquaLoop startup banner.
fn print_banner() {
    println!(
        r#"
   ~~~  AquaLoop v{}  ~~~
   primary -> secondary -> tertiary

   Treatment simulation for industrial water reuse
"#,
        env!("CARGO_PKG_VERSION")
    );
}
