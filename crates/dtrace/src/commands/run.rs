//! Run command.

use std::path::Path;

use dtrace::{Pipeline, RunConfig, TraceWriter};
use tracing::info;

use crate::cli::{FilterArgs, PassArgs};
use crate::terminal;

/// Arguments of the `run` command.
pub struct RunArgs<'a> {
    pub input: &'a Path,
    pub entry: &'a str,
    pub args: &'a [String],
    pub trace: &'a Path,
    pub instrument: bool,
    pub max_depth: usize,
    pub pass: &'a PassArgs,
    pub filter: &'a FilterArgs,
}

/// Handle the `run` command.
pub fn cmd_run(args: &RunArgs<'_>) -> dtrace::Result<()> {
    let mut pipeline = Pipeline::from_file(args.input)?;
    if args.instrument {
        let mut pass = super::build_pass(args.pass, args.filter)?;
        pipeline.instrument(&mut pass);
    }

    info!(entry = args.entry, trace = %args.trace.display(), "running");
    let writer = TraceWriter::new(args.trace);
    let config = RunConfig {
        max_depth: args.max_depth,
        ..RunConfig::default()
    };
    let result = pipeline.run(args.entry, args.args, &writer, config)?;

    println!("{result}");
    terminal::success(&format!(
        "@{} returned {result}; {} trace records",
        args.entry,
        writer.records_written()
    ));
    terminal::path_output(args.trace);
    Ok(())
}
