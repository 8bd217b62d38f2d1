//! Tally CLI

use std::{io, process::ExitCode};

use anyhow::Result;
use clap::Parser;

use tally::cli::{Cli, init_logging, run};

/// Tally CLI entry point
pub fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(&cli.logging)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    Ok(run(&cli, &mut handle)?.into())
}
