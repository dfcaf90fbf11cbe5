//! Grove CLI Binary
//!
//! Command-line interface for the grove project tree.

use anyhow::Context;
use clap::Parser;
use grove::logging::{init_logging, LoggingConfig};
use grove::tooling::cli::{Cli, CliContext};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let context = CliContext::new(cli.workspace.clone(), cli.config.clone())
        .context("Error initializing workspace")?;

    // Flags win over configuration; environment wins over both inside init_logging
    let mut logging: LoggingConfig = context.config().logging.clone();
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        logging.output = output.clone();
    }
    if cli.log_file.is_some() {
        logging.file = cli.log_file.clone();
    }
    init_logging(Some(&logging), Some(&cli.workspace)).context("Error initializing logging")?;

    let output = context.execute(&cli.command)?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
