// Entrypoint for the CLI application.
// - Keeps `main` small: set up logging, parse arguments, hand off to
//   `cli::run`.
// - Returns `anyhow::Result` so any failure surfaces with context and a
//   non-zero exit code.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pwncollege_cli::cli::{self, Args};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    cli::run(args)
}
