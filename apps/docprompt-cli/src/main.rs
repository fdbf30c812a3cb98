//! docprompt CLI binary entry point.
//!
//! Parses command-line arguments with clap, initializes the tracing
//! subscriber, and dispatches to the selected subcommand via [`Cli::run`].

mod cli;
mod logging;

use anyhow::Result;
use clap::Parser;

use crate::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = logging::init_tracing(cli.log_file.as_deref())?;

    cli.run()
}
