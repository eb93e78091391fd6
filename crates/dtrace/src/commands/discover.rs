//! Discover command.

use std::path::Path;

use dtrace::FilterSpec;
use tracing::info;

use crate::cli::FilterArgs;
use crate::terminal;

/// Handle the `discover` command.
pub fn cmd_discover(input: &Path, points: &Path, filter: &FilterArgs) -> dtrace::Result<()> {
    info!(input = %input.display(), "discovering program points");
    let module = dtrace::load_module(input)?;
    let filter = FilterSpec::from(filter).build()?;
    let found = dtrace::discover(&module, filter.as_ref(), points)?;

    terminal::success(&format!("{} program points in {}", found.len(), module.name));
    terminal::path_output(points);
    Ok(())
}
