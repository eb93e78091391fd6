//! Trace pass driver.
//!
//! Runs discovery once, then for every defined function in module order:
//! ENTER and EXIT declaration blocks, entry hook, exit hooks.

use std::path::PathBuf;

use dtrace_ir::Module;
use metrics::counter;
use tracing::{debug, info, info_span, warn};

use crate::decls::{DeclEmitter, PointKind};
use crate::filter::TraceFilter;
use crate::inject::{ENTRY_HOOK, EXIT_HOOK, Injector};
use crate::registry::ProgramPoints;

/// Declaration file written when none is configured.
pub const DEFAULT_DECLS_FILE: &str = "program.decls";

/// Pass configuration.
#[derive(Clone, Debug)]
pub struct PassConfig {
    /// Declaration output path.
    pub decls_path: PathBuf,
    /// Coordination file written after discovery (if Some).
    pub points_path: Option<PathBuf>,
    /// Entry hook symbol.
    pub entry_hook: String,
    /// Exit hook symbol.
    pub exit_hook: String,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            decls_path: PathBuf::from(DEFAULT_DECLS_FILE),
            points_path: None,
            entry_hook: ENTRY_HOOK.to_string(),
            exit_hook: EXIT_HOOK.to_string(),
        }
    }
}

impl PassConfig {
    /// Set the declaration output path.
    #[must_use]
    pub fn with_decls(mut self, path: impl Into<PathBuf>) -> Self {
        self.decls_path = path.into();
        self
    }

    /// Persist discovered points to `path`.
    #[must_use]
    pub fn with_points_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.points_path = Some(path.into());
        self
    }
}

/// Counters from one `run_on_module` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Defined functions visited.
    pub functions_seen: usize,
    /// Functions that received hooks.
    pub functions_instrumented: usize,
    pub entry_sites: usize,
    pub exit_sites: usize,
    /// Functions rejected by the filter.
    pub filtered: usize,
}

/// Entry/exit tracing pass.
///
/// One instance holds the process-scoped declaration state, so running it
/// over several modules appends to one declaration file (or suppresses,
/// if that file was already populated).
pub struct TracePass {
    config: PassConfig,
    filter: Box<dyn TraceFilter>,
    injector: Injector,
    decls: DeclEmitter,
    points: Option<ProgramPoints>,
}

impl TracePass {
    pub fn new(config: PassConfig, filter: Box<dyn TraceFilter>) -> Self {
        let injector = Injector::new(config.entry_hook.clone(), config.exit_hook.clone());
        let decls = DeclEmitter::new(config.decls_path.clone());
        Self {
            config,
            filter,
            injector,
            decls,
            points: None,
        }
    }

    /// Use externally loaded points instead of discovering them.
    #[must_use]
    pub fn with_points(mut self, points: ProgramPoints) -> Self {
        self.points = Some(points);
        self
    }

    /// Program points in use, once initialized.
    pub const fn points(&self) -> Option<&ProgramPoints> {
        self.points.as_ref()
    }

    fn ensure_points(&mut self, module: &Module) {
        if let Some(points) = &self.points {
            if !points.overlaps(module, self.filter.as_ref()) {
                warn!(
                    module = %module.name,
                    points = points.len(),
                    "program points name none of this module's functions; declaration blocks will be empty"
                );
            }
            return;
        }
        let points = ProgramPoints::discover(module, self.filter.as_ref());
        if let Some(path) = &self.config.points_path {
            if let Err(err) = points.persist(path, &module.name) {
                warn!(path = %path.display(), %err, "cannot write program points");
            }
        }
        self.points = Some(points);
    }

    /// Instrument every defined function of `module`.
    pub fn run_on_module(&mut self, module: &mut Module) -> PassStats {
        let _span = info_span!("trace_pass", module = %module.name).entered();
        self.ensure_points(module);
        let points = self.points.take().unwrap_or_default();

        let mut stats = PassStats::default();
        // Hook declarations appended during injection are never visited.
        let defined: Vec<usize> = (0..module.functions.len())
            .filter(|&i| !module.functions[i].is_declaration())
            .collect();

        for idx in defined {
            stats.functions_seen += 1;
            let func = &module.functions[idx];
            let enter = self.decls.emit_block(func, PointKind::Enter, &points);
            let exit = self.decls.emit_block(func, PointKind::Exit, &points);
            debug!(function = %func.name, ?enter, ?exit, "declarations");

            if !Injector::accepts(func, self.filter.as_ref()) {
                stats.filtered += 1;
                continue;
            }
            if self.injector.inject_entry(module, idx, self.filter.as_ref()) {
                stats.entry_sites += 1;
            }
            stats.exit_sites += self.injector.inject_exit(module, idx, self.filter.as_ref());
            stats.functions_instrumented += 1;
        }
        self.points = Some(points);

        publish(&stats);
        info!(
            functions = stats.functions_seen,
            instrumented = stats.functions_instrumented,
            filtered = stats.filtered,
            exit_sites = stats.exit_sites,
            "trace pass complete"
        );
        stats
    }

    /// Check if the declaration file was left untouched because it already
    /// had content.
    pub const fn decls_suppressed(&self) -> bool {
        self.decls.is_suppressed()
    }
}

fn publish(stats: &PassStats) {
    counter!("dtrace_functions_instrumented_total").increment(stats.functions_instrumented as u64);
    counter!("dtrace_entry_sites_total").increment(stats.entry_sites as u64);
    counter!("dtrace_exit_sites_total").increment(stats.exit_sites as u64);
    counter!("dtrace_functions_filtered_total").increment(stats.filtered as u64);
}
