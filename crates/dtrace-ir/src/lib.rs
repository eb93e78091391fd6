//! Typed intermediate representation for the dtrace instrumenter.
//!
//! This crate provides pure IR types with no tracing-specific knowledge:
//! modules, functions, blocks, instructions and a textual reader/printer.
//! Instrumentation is implemented in `dtrace-pass`.

mod block;
mod builder;
mod instr;
mod module;
mod operand;
mod parse;
mod terminator;
mod types;

pub use block::*;
pub use builder::*;
pub use instr::*;
pub use module::*;
pub use operand::*;
pub use parse::*;
pub use terminator::*;
pub use types::*;
