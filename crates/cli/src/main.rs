//! bucketcache: fetch objects from a bucket through a local disk cache

mod cli;
mod commands;
mod tracing;

use crate::cli::Cli;
use crate::tracing::TracingConfig;
use clap::Parser;

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    crate::tracing::init_tracing(TracingConfig {
        format: cli.tracing_format(),
        level: cli.level.into(),
        filter: None,
    })?;

    commands::execute(cli)
}
