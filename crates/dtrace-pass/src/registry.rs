//! Program point registry.
//!
//! Discovery lists every traceable function of a module. Within one
//! process the set is handed to the declaration emitter directly; the
//! coordination file exists for builds that discover and instrument in
//! separate processes. The file holds one module at a time: discovering a
//! second module overwrites the first.

use std::fs;
use std::io::Write;
use std::path::Path;

use dtrace_ir::Module;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::Result;
use crate::filter::TraceFilter;
use crate::naming::qualified_name;

/// Header prefix of the coordination file.
pub const MODULE_HEADER: &str = "Module_Name";

/// Qualified names of the functions a module owns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramPoints {
    names: Vec<String>,
    index: FxHashSet<String>,
}

impl ProgramPoints {
    /// Build from qualified names, keeping the first occurrence of each.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut points = Self::default();
        for name in names {
            points.insert(name.into());
        }
        points
    }

    fn insert(&mut self, name: String) {
        if self.index.insert(name.clone()) {
            self.names.push(name);
        }
    }

    /// Every defined function of `module` that passes `filter`, in module order.
    pub fn discover(module: &Module, filter: &dyn TraceFilter) -> Self {
        let points = Self::from_names(
            module
                .defined_functions()
                .filter(|f| filter.should_trace(&f.name))
                .map(|f| qualified_name(&f.name)),
        );
        debug!(module = %module.name, points = points.len(), "discovered program points");
        points
    }

    /// Write the coordination file, replacing any previous content.
    pub fn persist(&self, path: &Path, module_name: &str) -> Result<()> {
        let mut out = format!("{MODULE_HEADER} : {module_name}\n");
        for name in &self.names {
            out.push_str(name);
            out.push_str(" \n");
        }
        out.push('\n');
        let mut file = fs::File::create(path)?;
        file.write_all(out.as_bytes())?;
        debug!(path = %path.display(), points = self.len(), "wrote program points");
        Ok(())
    }

    /// Read a coordination file.
    ///
    /// The header and blank lines are skipped; other lines are trimmed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let points = Self::from_names(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with(MODULE_HEADER)),
        );
        debug!(path = %path.display(), points = points.len(), "loaded program points");
        Ok(points)
    }

    /// Check if any defined function of `module` passing `filter` is listed.
    ///
    /// A module with nothing traceable overlaps trivially.
    pub fn overlaps(&self, module: &Module, filter: &dyn TraceFilter) -> bool {
        let mut traceable = module
            .defined_functions()
            .filter(|f| filter.should_trace(&f.name))
            .peekable();
        traceable.peek().is_none() || traceable.any(|f| self.contains(&qualified_name(&f.name)))
    }

    pub fn contains(&self, qualified: &str) -> bool {
        self.index.contains(qualified)
    }

    /// Names in discovery order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
