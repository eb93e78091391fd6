//! Runtime trace writer for dtrace-instrumented programs.
//!
//! This crate provides:
//! - `TraceWriter`: serialized, nonce-tagged record writer (one lock, one
//!   header flag, thread-local call depth)
//! - `TraceValue` / `TraceVar`: type-tagged values and their rendering
//! - C ABI hooks (`dtrace_hook_func_begin`, `dtrace_hook_func_end`,
//!   `dtrace_hook_fault_injection`) writing through a process-global writer;
//!   the variadic entry/exit hooks are a C shim built from `csrc/` against
//!   the header from [`hook_header`]
//!
//! # Example
//!
//! ```ignore
//! use dtrace_rt::{TraceValue, TraceVar, TraceWriter};
//!
//! let writer = TraceWriter::new("program.dtrace");
//! writer.on_entry("..add:::ENTER", &[TraceVar::new("a", TraceValue::Int(2))]);
//! ```

mod error;
mod ffi;
mod header;
pub mod tag;
mod value;
mod writer;

pub use error::{Result, RuntimeError};
pub use ffi::{
    DEFAULT_TRACE_FILE, FAULT_INJECTION_HOOK, FfiTraceArg, FfiTraceValue, TRACE_FILE_ENV,
    dtrace_hook_fault_injection, dtrace_record_func_begin, dtrace_record_func_end, global,
};
pub use header::{HEADER_NAME, MAX_HOOK_VARS, hook_header};
pub use value::{TraceValue, TraceVar};
pub use writer::{
    FAULT_INJECTION_MARKER, NONCE_LABEL, RecordKind, TRACE_HEADER, TraceWriter, call_depth,
    current_nonce, render_record, thread_id,
};
