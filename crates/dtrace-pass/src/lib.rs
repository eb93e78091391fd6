//! Entry/exit tracing instrumentation over dtrace IR.
//!
//! The pass works in three steps per module:
//! 1. Discover program points (traceable functions) and optionally persist
//!    them for later processes.
//! 2. Append ENTER/EXIT declaration blocks describing each function's
//!    traced parameters and return value.
//! 3. Inject hook calls at function entry and before every return, passing
//!    the traced values to the runtime.
//!
//! Filtering is pluggable through [`TraceFilter`].

mod classify;
mod decls;
mod error;
mod filter;
mod inject;
mod naming;
mod pass;
mod registry;

pub use classify::{SemanticType, TracedVariable, classify, traced_params, traced_return};
pub use decls::{DECL_HEADER, DeclEmitter, Emitted, PointKind};
pub use error::{PassError, Result};
pub use filter::{
    AllOf, AllowList, DEFAULT_DENY_SUBSTRINGS, DenyList, FAULT_INJECTION_PREFIX, RegexFilter,
    TraceFilter,
};
pub use inject::{ENTRY_HOOK, EXIT_HOOK, Injector, RETURN_VAR};
pub use naming::{ENTER_SUFFIX, EXIT_SUFFIX, demangle, entry_point_name, exit_point_name, qualified_name};
pub use pass::{DEFAULT_DECLS_FILE, PassConfig, PassStats, TracePass};
pub use registry::{MODULE_HEADER, ProgramPoints};
