//! Program point naming.

use cpp_demangle::Symbol;

/// Suffix of entry program points.
pub const ENTER_SUFFIX: &str = ":::ENTER";
/// Suffix of exit program points.
pub const EXIT_SUFFIX: &str = ":::EXIT0";

/// Demangle an Itanium C++ symbol; other names are returned unchanged.
pub fn demangle(raw: &str) -> String {
    Symbol::new(raw).map_or_else(|_| raw.to_string(), |symbol| symbol.to_string())
}

/// Trace-safe qualified name of a function.
///
/// The name is demangled, `main` becomes `main()`, and every space is
/// replaced by `\_` so the name stays a single token in the trace files.
pub fn qualified_name(raw: &str) -> String {
    let mut name = demangle(raw);
    if name == "main" {
        name.push_str("()");
    }
    name.replace(' ', "\\_")
}

/// Program point name of a function's entry, e.g. `..add:::ENTER`.
pub fn entry_point_name(raw: &str) -> String {
    format!("..{}{ENTER_SUFFIX}", qualified_name(raw))
}

/// Program point name of a function's exit, e.g. `..add:::EXIT0`.
pub fn exit_point_name(raw: &str) -> String {
    format!("..{}{EXIT_SUFFIX}", qualified_name(raw))
}
