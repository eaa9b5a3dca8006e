//! # bucko
//!
//! Builds a scratch container image from the contents of a compose and
//! publishes the build metadata for the rest of the CI pipeline.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    cli::execute(cli)
}
