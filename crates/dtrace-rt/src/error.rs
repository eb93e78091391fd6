use thiserror::Error;

/// Runtime argument decoding errors.
///
/// These never reach the traced program; hooks log them and skip the
/// offending value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("null pointer in trace argument")]
    NullPointer,
    #[error("trace argument is not valid UTF-8")]
    InvalidUtf8,
    #[error("unknown type tag '{0}'")]
    UnknownTag(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
