//! confpm CLI entry point.
//!
//! Parses the command line, initializes logging, executes the selected
//! command, and renders failures through the user-friendly error reporter.
//! Exit codes: `0` on success, `1` on any error.

use anyhow::Result;
use clap::Parser;
use confpm::cli::Cli;
use confpm::core::user_friendly_error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(err) => {
            user_friendly_error(err).display();
            std::process::exit(1);
        }
    }
}
