//! # grpcurl CLI Entry Point
//!
//! The main executable. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Installs the log subscriber and parses arguments using [`cli::Cli`].
//! 2. **Execution**: Delegates to [`commands::run`], which connects through `grpcurl_core`.
//! 3. **Termination**: Prints any error as a single line on stderr and exits with status 1.
//!
//! Logs are controlled by the `GRPCURL_LOG` environment variable (e.g. `GRPCURL_LOG=debug`) and
//! are written to stderr, so stdout only carries command output.
mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::Cli;
use std::process;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "GRPCURL_LOG";

#[tokio::main]
async fn main() {
    init_tracing();

    let args = Cli::parse();

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    if let Err(err) = commands::run(args, stdin.lock(), &mut stdout).await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
