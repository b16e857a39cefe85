//! CLI entry point for the intra42 tool.

use anyhow::Result;
use clap::Parser;
use intra42::SessionConfig;
use tracing::{debug, info};

mod cli;
mod commands;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Args carry credentials; log only the session limits
    debug!(
        connect_timeout = args.connect_timeout,
        request_timeout = args.request_timeout,
        max_connections = args.max_connections,
        "CLI arguments parsed"
    );
    info!("intra42 starting");

    let config = SessionConfig::with_limits(
        args.connect_timeout,
        args.request_timeout,
        args.max_connections,
    );

    match &args.command {
        Command::Records(records) => commands::run_records_command(records, config).await,
        Command::Attachments(attachments) => {
            commands::run_attachments_command(attachments, config).await
        }
    }
}
