use thiserror::Error;

/// Tracer errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IR parse error: {0}")]
    Parse(#[from] dtrace_ir::ParseError),
    #[error("pass error: {0}")]
    Pass(#[from] dtrace_pass::PassError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown function @{0}")]
    UnknownFunction(String),
    #[error("unknown value {0}")]
    UnknownValue(String),
    #[error("unknown block %{label} in @{function}")]
    UnknownBlock { function: String, label: String },
    #[error("call to external function @{0} is not supported")]
    UnsupportedExtern(String),
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("reached unreachable terminator in @{0}")]
    Unreachable(String),
    #[error("@{function} takes {expected} arguments, got {actual}")]
    ArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },
    #[error("invalid {ty} literal {text:?}")]
    BadLiteral { ty: String, text: String },
    #[error("malformed hook call to @{0}")]
    BadHookCall(String),
    #[error("call depth limit {0} exceeded")]
    StackOverflow(usize),
    #[error("step limit {0} exceeded")]
    StepLimit(u64),
}

pub type Result<T> = std::result::Result<T, Error>;
