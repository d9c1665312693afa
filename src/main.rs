//! # Component Updater CLI
//!
//! This is the binary entry point for the `component-updater` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Initializing logging.
//! - Wiring the real collaborators (git, atmos, go-getter, GitHub) into the
//!   update engine and running it.
//!
//! Any error ends the process with exit code 1. The update logic lives in the
//! library crate; the binary is a thin wrapper around it.

mod cli;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.init_logging();
    cli.execute()
}
