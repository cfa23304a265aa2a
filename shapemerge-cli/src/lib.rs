//! shapemerge CLI library.
//!
//! This crate provides the argument types, command handlers, and config
//! loading behind the `shapemerge` binary. Library consumers can build a
//! [`Cli`](cli::Cli) programmatically and call [`run`] directly.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

use cli::{Cli, Commands};
use config::FileConfig;

/// Dispatch a parsed [`Cli`] to the appropriate command handler.
///
/// Inputs are read fully and the output file is written only after the run
/// succeeds, so a failed run never leaves a partial output behind.
pub fn run(cli: Cli) -> error::CliResult<()> {
    let file_config = FileConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Dissolve(args) => {
            commands::dissolve::run(args, file_config.dissolve, cli.quiet)?;
        }
        Commands::PointMatch(args) => {
            commands::point_match::run(args, file_config.point_match, cli.quiet)?;
        }
    }
    Ok(())
}
