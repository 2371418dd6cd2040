//! mantis - command-line client for MantisBT
//!
//! # Configuration
//!
//! Set the following environment variables (or use a `.env` file):
//!
//! - `MANTIS_BASE_URL`: Base URL of the Mantis installation
//! - `MANTIS_USERNAME`, `MANTIS_PASSWORD`: SOAP credentials
//! - `MANTIS_API_TOKEN`: REST token, only needed for `token` and `user me`
//!
//! # Usage
//!
//! ```bash
//! mantis issue get 1000
//! mantis issue attach 1000 ./trace.log
//! mantis --verbose issue status 80 1000 1001
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use mantis_connect::cli::{self, Cli};
use mantis_connect::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore errors if not found)
    dotenvy::dotenv().ok();

    let args = Cli::parse();

    // Logs go to stderr; stdout carries the JSON output
    let default_filter = if args.verbose {
        "mantis_connect=debug"
    } else {
        "mantis_connect=info"
    };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::debug!("mantis v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::debug!(base_url = %config.base_url, "Configuration loaded");

    cli::run(args, config).await
}
