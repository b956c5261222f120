//! Sentra daemon: wires the audit pipeline and notification engine.
//!
//! Startup order matters: telemetry first, then configuration, then the
//! durable stores, then catalog reconciliation (fatal on failure), and
//! only then the scheduler and its jobs.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod app;
mod retention;

use std::path::PathBuf;

use clap::Parser;
use sentra_config::MonitorConfig;
use sentra_telemetry::{LogConfig, LogFormat, setup_logging};

/// Sentra monitoring backend daemon.
#[derive(Debug, Parser)]
#[command(name = "sentrad", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "SENTRA_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for durable storage.
    #[arg(long, env = "SENTRA_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => sentra_config::load(path)?,
        None => MonitorConfig::default(),
    };

    let mut log_config = LogConfig::new(&config.logging.level)
        .with_format(config.logging.format.parse::<LogFormat>()?);
    for directive in &config.logging.directives {
        log_config = log_config.with_directive(directive);
    }
    setup_logging(&log_config)?;

    app::run(config, &args.data_dir).await
}
