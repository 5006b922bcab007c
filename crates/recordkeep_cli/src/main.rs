//! recordkeep command-line entry point.
//!
//! # Responsibility
//! - Parse arguments, start logging, and dispatch to `recordkeep_core`.
//! - Report failures on stderr with a non-zero exit code.

use clap::Parser;

mod commands;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = cli.execute().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
