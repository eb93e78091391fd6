use thiserror::Error;

/// Pass errors.
///
/// Only the explicit file APIs (coordination file persistence and loading,
/// filter construction) return these; the instrumentation path itself
/// degrades to "skip" instead of failing.
#[derive(Error, Debug)]
pub enum PassError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid filter pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, PassError>;
