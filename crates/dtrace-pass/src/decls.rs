//! Declaration file emission.
//!
//! For each function the emitter appends an ENTER block and an EXIT block
//! describing the traced parameters (and the return value at exit). The
//! first call decides whether this emitter writes anything at all: an empty
//! or missing file gets the format header and subsequent blocks; a file
//! that already has content is left alone for the emitter's lifetime.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use dtrace_ir::Function;
use tracing::{debug, warn};

use crate::classify::{TracedVariable, traced_params, traced_return};
use crate::naming::{ENTER_SUFFIX, EXIT_SUFFIX, qualified_name};
use crate::registry::ProgramPoints;

/// Format header of the declaration file.
pub const DECL_HEADER: &str = "input-language C/C++\ndecl-version 2.0\nvar-comparability none\n\n";

/// Which side of a function a block describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointKind {
    Enter,
    Exit,
}

impl PointKind {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Enter => ENTER_SUFFIX,
            Self::Exit => EXIT_SUFFIX,
        }
    }

    const fn ppt_type(self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Exit => "subexit",
        }
    }
}

/// Outcome of a single `emit_block` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Emitted {
    /// A full block was written.
    Block,
    /// The point is not owned by this module; only the terminator was written.
    Filtered,
    /// Nothing was written (suppressed, or file unavailable).
    Nothing,
}

/// Appends declaration blocks to one file.
///
/// Holds the once-per-process state: whether the header check has run and
/// whether emission has been suppressed.
#[derive(Debug)]
pub struct DeclEmitter {
    path: PathBuf,
    header_checked: bool,
    suppressed: bool,
}

impl DeclEmitter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            header_checked: false,
            suppressed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if emission was suppressed because the file already had content.
    pub const fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Append the `kind` block of `func`.
    ///
    /// Never fails: an unavailable file turns the call into a no-op.
    pub fn emit_block(&mut self, func: &Function, kind: PointKind, points: &ProgramPoints) -> Emitted {
        if self.suppressed {
            return Emitted::Nothing;
        }

        let mut out = String::new();
        if !self.header_checked {
            self.header_checked = true;
            if !file_is_empty(&self.path) {
                debug!(path = %self.path.display(), "declarations already present, suppressing");
                self.suppressed = true;
                return Emitted::Nothing;
            }
            out.push_str(DECL_HEADER);
        }

        let name = qualified_name(&func.name);
        let emitted = if points.contains(&name) {
            render_block(&mut out, &name, func, kind);
            Emitted::Block
        } else {
            Emitted::Filtered
        };
        out.push('\n');

        match self.append(&out) {
            Ok(()) => emitted,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "cannot write declarations");
                Emitted::Nothing
            }
        }
    }

    fn append(&self, text: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(text.as_bytes())
    }
}

/// Missing files count as empty.
fn file_is_empty(path: &Path) -> bool {
    fs::metadata(path).map_or(true, |m| m.len() == 0)
}

fn render_block(out: &mut String, name: &str, func: &Function, kind: PointKind) {
    let _ = writeln!(out, "ppt ..{name}{}", kind.suffix());
    let _ = writeln!(out, " ppt-type {}", kind.ppt_type());

    for param in traced_params(func) {
        render_variable(out, &param, true);
    }
    if kind == PointKind::Exit {
        if let Some(ty) = traced_return(func) {
            let ret = TracedVariable {
                name: "return".to_string(),
                ty,
            };
            render_variable(out, &ret, false);
        }
    }
}

fn render_variable(out: &mut String, var: &TracedVariable, is_param: bool) {
    let _ = writeln!(out, " variable {}", var.name);
    let _ = writeln!(out, "  var-kind variable");
    let _ = writeln!(out, "  rep-type {}", var.ty);
    let _ = writeln!(out, "  dec-type {}", var.ty);
    if is_param {
        let _ = writeln!(out, "  flags is_param");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtrace_ir::{BinaryOp, FunctionBuilder, Operand, Type};

    fn add() -> Function {
        FunctionBuilder::new("add", Type::I32)
            .param("a", Type::I32)
            .param("b", Type::I32)
            .binary("sum", BinaryOp::Add, Type::I32, Operand::local("a"), Operand::local("b"))
            .ret(Type::I32, Operand::local("sum"))
            .build()
    }

    const ADD_DECLS: &str = "\
ppt ..add:::ENTER
 ppt-type enter
 variable a
  var-kind variable
  rep-type int
  dec-type int
  flags is_param
 variable b
  var-kind variable
  rep-type int
  dec-type int
  flags is_param

ppt ..add:::EXIT0
 ppt-type subexit
 variable a
  var-kind variable
  rep-type int
  dec-type int
  flags is_param
 variable b
  var-kind variable
  rep-type int
  dec-type int
  flags is_param
 variable return
  var-kind variable
  rep-type int
  dec-type int

";

    #[test]
    fn test_enter_and_exit_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.decls");
        let mut emitter = DeclEmitter::new(&path);
        let points = ProgramPoints::from_names(["add"]);

        assert_eq!(emitter.emit_block(&add(), PointKind::Enter, &points), Emitted::Block);
        assert_eq!(emitter.emit_block(&add(), PointKind::Exit, &points), Emitted::Block);

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, format!("{DECL_HEADER}{ADD_DECLS}"));
    }

    #[test]
    fn test_unowned_point_writes_blank_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.decls");
        let mut emitter = DeclEmitter::new(&path);

        let result = emitter.emit_block(&add(), PointKind::Enter, &ProgramPoints::default());
        assert_eq!(result, Emitted::Filtered);
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{DECL_HEADER}\n"));
    }

    #[test]
    fn test_populated_file_suppresses_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.decls");
        fs::write(&path, "existing\n").unwrap();
        let points = ProgramPoints::from_names(["add"]);

        let mut emitter = DeclEmitter::new(&path);
        for _ in 0..2 {
            assert_eq!(emitter.emit_block(&add(), PointKind::Enter, &points), Emitted::Nothing);
            assert_eq!(emitter.emit_block(&add(), PointKind::Exit, &points), Emitted::Nothing);
        }
        assert!(emitter.is_suppressed());
        assert_eq!(fs::read_to_string(&path).unwrap(), "existing\n");
    }

    #[test]
    fn test_second_emitter_on_same_file_is_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.decls");
        let points = ProgramPoints::from_names(["add"]);

        let mut first = DeclEmitter::new(&path);
        first.emit_block(&add(), PointKind::Enter, &points);
        first.emit_block(&add(), PointKind::Exit, &points);
        let after_first = fs::read_to_string(&path).unwrap();

        let mut second = DeclEmitter::new(&path);
        second.emit_block(&add(), PointKind::Enter, &points);
        second.emit_block(&add(), PointKind::Exit, &points);
        assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
    }

    #[test]
    fn test_header_written_once_across_functions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.decls");
        let points = ProgramPoints::from_names(["add", "scale"]);
        let scale = FunctionBuilder::new("scale", Type::Void)
            .param("xs", Type::Double.ptr_to())
            .param("label", Type::c_str())
            .ret_void()
            .build();

        let mut emitter = DeclEmitter::new(&path);
        for func in [add(), scale] {
            emitter.emit_block(&func, PointKind::Enter, &points);
            emitter.emit_block(&func, PointKind::Exit, &points);
        }

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("decl-version").count(), 1);
        assert!(text.contains("ppt ..scale:::EXIT0\n ppt-type subexit\n variable xs\n"));
        assert!(text.contains("  rep-type double[]\n"));
        assert!(!text.contains("label"));
    }

    #[test]
    fn test_unwritable_path_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("program.decls");
        let mut emitter = DeclEmitter::new(&path);
        let points = ProgramPoints::from_names(["add"]);
        assert_eq!(emitter.emit_block(&add(), PointKind::Enter, &points), Emitted::Nothing);
        assert!(!path.exists());
    }
}
