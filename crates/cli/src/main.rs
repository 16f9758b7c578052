#![warn(clippy::all, clippy::pedantic)]

use clap::Parser;
use psbt_swap_cli::cli::Cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging_init();

    let cli = Cli::parse();
    psbt_swap_cli::run(cli).await
}

/// Logs go to stderr; stdout carries the JSON results.
fn logging_init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
