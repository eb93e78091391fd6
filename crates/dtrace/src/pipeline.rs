//! Tracing pipeline - IR text → module → instrumented module → trace.

use std::fs;
use std::path::Path;
use std::time::Instant;

use dtrace_ir::{Module, parse_module};
use dtrace_pass::{
    AllOf, DenyList, PassConfig, PassStats, ProgramPoints, RegexFilter, TraceFilter, TracePass,
};
use dtrace_rt::TraceWriter;
use metrics::histogram;
use tracing::{debug, info, info_span};

use crate::Result;
use crate::runner::{RtValue, RunConfig, Runner};

/// Filter selection, as given on the command line.
#[derive(Clone, Debug, Default)]
pub struct FilterSpec {
    /// Extra substrings to reject, on top of the default deny list.
    pub deny: Vec<String>,
    /// Only trace names matching this pattern.
    pub allow_regex: Option<String>,
    /// Never trace names matching this pattern.
    pub deny_regex: Option<String>,
}

impl FilterSpec {
    /// Build the filter: the default deny list, extended and narrowed.
    pub fn build(&self) -> Result<Box<dyn TraceFilter>> {
        let deny = self
            .deny
            .iter()
            .fold(DenyList::default(), |list, s| list.with_substring(s.clone()));
        if self.allow_regex.is_none() && self.deny_regex.is_none() {
            return Ok(Box::new(deny));
        }
        let regex = RegexFilter::new(self.allow_regex.as_deref(), self.deny_regex.as_deref())?;
        Ok(Box::new(AllOf::default().with(deny).with(regex)))
    }
}

/// Read and parse a textual IR file.
///
/// The file name becomes the module name unless the text declares one.
pub fn load_module(path: &Path) -> Result<Module> {
    let text = fs::read_to_string(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("module");
    let module = parse_module(&text, name)?;
    debug!(
        module = %module.name,
        functions = module.functions.len(),
        globals = module.globals.len(),
        "loaded module"
    );
    Ok(module)
}

/// Discover a module's program points and write the coordination file.
pub fn discover(module: &Module, filter: &dyn TraceFilter, points_path: &Path) -> Result<ProgramPoints> {
    let points = ProgramPoints::discover(module, filter);
    points.persist(points_path, &module.name)?;
    info!(points = points.len(), path = %points_path.display(), "wrote program points");
    Ok(points)
}

/// A module moving through the pipeline.
pub struct Pipeline {
    /// Current module (instrumented after `instrument`).
    pub module: Module,
    /// Stats of the last instrumentation run.
    pub stats: Option<PassStats>,
}

impl Pipeline {
    pub const fn new(module: Module) -> Self {
        Self {
            module,
            stats: None,
        }
    }

    /// Load from a textual IR file.
    pub fn from_file(path: &Path) -> Result<Self> {
        load_module(path).map(Self::new)
    }

    /// Load from IR text.
    pub fn from_text(text: &str, name: &str) -> Result<Self> {
        Ok(Self::new(parse_module(text, name)?))
    }

    /// Run the trace pass over the module.
    pub fn instrument(&mut self, pass: &mut TracePass) -> PassStats {
        let start = Instant::now();
        let stats = pass.run_on_module(&mut self.module);
        histogram!("dtrace_pass_duration_seconds").record(start.elapsed().as_secs_f64());
        self.stats = Some(stats);
        stats
    }

    /// Instrument with a fresh pass built from `config` and `filter`.
    pub fn instrument_with(&mut self, config: PassConfig, filter: &FilterSpec) -> Result<PassStats> {
        let mut pass = TracePass::new(config, filter.build()?);
        Ok(self.instrument(&mut pass))
    }

    /// Interpret `entry` with literal arguments, tracing through `writer`.
    pub fn run(&self, entry: &str, args: &[String], writer: &TraceWriter, config: RunConfig) -> Result<RtValue> {
        let _span = info_span!("run", entry).entered();
        let runner = Runner::with_config(&self.module, writer, config);
        let result = runner.call_with_literals(entry, args)?;
        info!(
            result = %result,
            steps = runner.steps(),
            records = writer.records_written(),
            "run complete"
        );
        Ok(result)
    }

    /// Write the module as textual IR.
    pub fn write_ir(&self, path: &Path) -> Result<()> {
        fs::write(path, self.module.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_spec_default_is_deny_list() {
        let filter = FilterSpec::default().build().unwrap();
        assert!(filter.should_trace("add"));
        assert!(!filter.should_trace("shaHash"));
        assert!(!filter.should_trace("injectFault0"));
    }

    #[test]
    fn test_filter_spec_extensions() {
        let spec = FilterSpec {
            deny: vec!["debug".to_string()],
            allow_regex: Some("^(add|debug_add|sha)".to_string()),
            deny_regex: None,
        };
        let filter = spec.build().unwrap();
        assert!(filter.should_trace("add"));
        assert!(filter.should_trace("addAll"));
        assert!(!filter.should_trace("debug_add"));
        assert!(!filter.should_trace("sha1"));
        assert!(!filter.should_trace("mul"));

        let bad = FilterSpec {
            deny_regex: Some("(".to_string()),
            ..FilterSpec::default()
        };
        assert!(bad.build().is_err());
    }

    #[test]
    fn test_load_module_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.ll");
        fs::write(&path, "define void @f() {\nentry:\n  ret void\n}\n").unwrap();
        let module = load_module(&path).unwrap();
        assert_eq!(module.name, "unit.ll");
        assert!(module.function("f").is_some());
    }

    #[test]
    fn test_write_ir_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let text = "module \"a.c\"\n\ndefine i32 @id(i32 %x) {\nentry:\n  ret i32 %x\n}\n";
        let pipeline = Pipeline::from_text(text, "a.c").unwrap();
        let out = dir.path().join("out.ll");
        pipeline.write_ir(&out).unwrap();
        assert_eq!(load_module(&out).unwrap(), pipeline.module);
    }
}
