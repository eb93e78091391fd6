//! Instrument command.

use std::path::Path;

use dtrace::Pipeline;
use tracing::info;

use crate::cli::{FilterArgs, PassArgs};
use crate::terminal;

/// Handle the `instrument` command.
pub fn cmd_instrument(input: &Path, output: &Path, pass: &PassArgs, filter: &FilterArgs) -> dtrace::Result<()> {
    info!(input = %input.display(), output = %output.display(), "instrumenting");
    let mut trace_pass = super::build_pass(pass, filter)?;
    let mut pipeline = Pipeline::from_file(input)?;
    let stats = pipeline.instrument(&mut trace_pass);
    pipeline.write_ir(output)?;

    if trace_pass.decls_suppressed() {
        terminal::warning(&format!(
            "{} already has declarations; left unchanged",
            pass.decls.display()
        ));
    }
    terminal::success(&format!(
        "instrumented {}/{} functions ({} exit sites)",
        stats.functions_instrumented, stats.functions_seen, stats.exit_sites
    ));
    terminal::path_output(output);
    Ok(())
}
