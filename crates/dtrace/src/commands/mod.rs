//! Command implementations.
//!
//! Each submodule handles one CLI command.

mod classify;
mod discover;
mod instrument;
mod run;

use dtrace::{FilterSpec, PassConfig, ProgramPoints, TracePass};
use tracing::{error, info};

use crate::cli::{Cli, Commands, EXIT_FAILURE, EXIT_SUCCESS, FilterArgs, PassArgs};
use crate::terminal;

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    let result = match &cli.command {
        Commands::Discover {
            input,
            points,
            filter,
        } => discover::cmd_discover(input, points, filter),
        Commands::Instrument {
            input,
            output,
            pass,
            filter,
        } => instrument::cmd_instrument(input, output, pass, filter),
        Commands::Run {
            input,
            entry,
            args,
            trace,
            instrument,
            max_depth,
            pass,
            filter,
        } => run::cmd_run(&run::RunArgs {
            input,
            entry,
            args,
            trace,
            instrument: *instrument,
            max_depth: *max_depth,
            pass,
            filter,
        }),
        Commands::Classify { input, all, filter } => classify::cmd_classify(input, *all, filter),
    };

    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            terminal::error(&err.to_string());
            EXIT_FAILURE
        }
    }
}

/// Build a trace pass from CLI arguments.
///
/// An existing coordination file is loaded and left untouched; a missing
/// one is written after discovery.
fn build_pass(pass: &PassArgs, filter: &FilterArgs) -> dtrace::Result<TracePass> {
    let mut config = PassConfig::from(pass);
    let loaded = match &config.points_path {
        Some(path) if path.exists() => {
            let points = ProgramPoints::load(path)?;
            info!(path = %path.display(), points = points.len(), "using program points");
            config.points_path = None;
            Some(points)
        }
        _ => None,
    };

    let pass = TracePass::new(config, FilterSpec::from(filter).build()?);
    Ok(match loaded {
        Some(points) => pass.with_points(points),
        None => pass,
    })
}
