//! dtrace - entry/exit value tracing for typed IR modules
//!
//! Instruments functions so every call records its traced parameters on
//! entry and its parameters plus return value on exit, writes the matching
//! declaration file, and runs instrumented modules through an interpreter
//! wired to the runtime trace writer.
//!
//! # Example
//!
//! ```ignore
//! use dtrace::{FilterSpec, PassConfig, Pipeline, RunConfig, TraceWriter};
//!
//! let mut pipeline = Pipeline::from_file("add.ll".as_ref())?;
//! pipeline.instrument_with(PassConfig::default(), &FilterSpec::default())?;
//! let writer = TraceWriter::new("program.dtrace");
//! pipeline.run("add", &["2".into(), "3".into()], &writer, RunConfig::default())?;
//! ```

// Re-export from sub-crates
pub use dtrace_ir::{Function, Module, ParseError, Type, parse_module};
pub use dtrace_pass::{
    AllOf, AllowList, DeclEmitter, DenyList, Injector, PassConfig, PassError, PassStats,
    PointKind, ProgramPoints, RegexFilter, SemanticType, TraceFilter, TracePass, classify,
    qualified_name, traced_params, traced_return,
};
pub use dtrace_rt::{TRACE_HEADER, TraceValue, TraceVar, TraceWriter};

mod error;
pub mod metrics;
mod pipeline;
pub mod runner;

pub use error::{Error, Result};
pub use pipeline::*;
pub use runner::{RtValue, RunConfig, Runner};
