//! Styled output helpers for CLI commands.

use std::path::Path;

use console::style;

/// Print a success message to stderr.
pub fn success(message: &str) {
    eprintln!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message to stderr.
pub fn warning(message: &str) {
    eprintln!("{} {}", style("!").yellow().bold(), message);
}

/// Print a path output (like "-> /path/to/file").
pub fn path_output(path: &Path) {
    eprintln!("  {} {}", style("→").dim(), style(path.display()).dim());
}

/// Print a section title to stdout.
pub fn header(message: &str) {
    println!("{}", style(message).bold());
}

/// Print a dimmed, indented line to stdout.
pub fn dim(message: &str) {
    println!("  {}", style(message).dim());
}
