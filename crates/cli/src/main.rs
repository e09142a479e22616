//! `landbook` -- command-line front end for field boundaries.
//!
//! # Environment variables
//!
//! | Variable                        | Default    | Description                         |
//! |---------------------------------|------------|-------------------------------------|
//! | `RUST_LOG`                      | see below  | Log filter                          |
//! | `LANDBOOK_LOG_JSON`             | `0`        | JSON log lines when `1`             |
//! | `LANDBOOK_DEFAULT_COLOR`        | `FF2E7D32` | ARGB color for lands without one    |
//! | `LANDBOOK_LOCATION_INTERVAL_MS` | `1000`     | Interval between replayed fixes     |
//! | `LANDBOOK_MIN_DISPLACEMENT_M`   | `0`        | Minimum distance between fixes      |

mod commands;
mod config;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::Cli;
use crate::config::CliConfig;

const DEFAULT_LOG_FILTER: &str = "landbook=info,landbook_db=info,landbook_events=info";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = CliConfig::from_env().unwrap_or_else(|e| {
        eprintln!("error: {e:#}");
        std::process::exit(2);
    });

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "Starting");

    if let Err(e) = commands::run(cli, &config).await {
        tracing::error!(error = %format!("{e:#}"), "Command failed");
        eprintln!("{e}");
        std::process::exit(1);
    }
}
