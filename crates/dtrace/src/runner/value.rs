//! Interpreter values.

use std::fmt;

use dtrace_ir::Type;

use crate::{Error, Result};

/// A value held by the interpreter.
///
/// Pointers to `i32`/`i64` and `double` are modeled as whole arrays (the
/// pointee plus its length); stack slots are indices into the frame.
#[derive(Clone, Debug, PartialEq)]
pub enum RtValue {
    Int(i64),
    /// Stored widened; arithmetic rounds back to single precision.
    Float(f64),
    Double(f64),
    IntArray(Vec<i64>),
    DoubleArray(Vec<f64>),
    Str(String),
    /// Frame slot created by `alloca`.
    Slot(usize),
    Void,
}

impl RtValue {
    /// Short kind name for diagnostics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::IntArray(_) => "int array",
            Self::DoubleArray(_) => "double array",
            Self::Str(_) => "string",
            Self::Slot(_) => "slot",
            Self::Void => "void",
        }
    }

    /// Zero value stored in a fresh slot of type `ty`.
    pub fn zero(ty: &Type) -> Self {
        match ty {
            Type::Int(_) => Self::Int(0),
            Type::Float => Self::Float(0.0),
            Type::Double => Self::Double(0.0),
            Type::Ptr(inner) => match inner.as_ref() {
                Type::Int(8) => Self::Str(String::new()),
                Type::Int(_) => Self::IntArray(Vec::new()),
                Type::Double => Self::DoubleArray(Vec::new()),
                _ => Self::Void,
            },
            _ => Self::Void,
        }
    }

    /// Parse a command-line literal of type `ty`.
    ///
    /// Arrays are written as comma or space separated lists, optionally
    /// wrapped in `[ ]`; `nan` is accepted for reals.
    pub fn parse(text: &str, ty: &Type) -> Result<Self> {
        let bad = || Error::BadLiteral {
            ty: ty.to_string(),
            text: text.to_string(),
        };
        let text = text.trim();
        match ty {
            Type::Int(bits) => text
                .parse::<i64>()
                .map(|v| Self::Int(truncate(v, *bits)))
                .map_err(|_| bad()),
            Type::Float => parse_real(text).map(|v| Self::Float(round_f32(v))).ok_or_else(bad),
            Type::Double => parse_real(text).map(Self::Double).ok_or_else(bad),
            Type::Ptr(inner) => match inner.as_ref() {
                Type::Int(8) => Ok(Self::Str(text.to_string())),
                Type::Int(_) => list(text)
                    .map(|s| s.parse::<i64>().ok())
                    .collect::<Option<Vec<_>>>()
                    .map(Self::IntArray)
                    .ok_or_else(bad),
                Type::Double => list(text)
                    .map(parse_real)
                    .collect::<Option<Vec<_>>>()
                    .map(Self::DoubleArray)
                    .ok_or_else(bad),
                _ => Err(bad()),
            },
            _ => Err(bad()),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(v) => Ok(*v),
            other => Err(mismatch("int", other)),
        }
    }

    pub fn as_real(&self) -> Result<f64> {
        match self {
            Self::Float(v) | Self::Double(v) => Ok(*v),
            other => Err(mismatch("float or double", other)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Self::Str(s) => Ok(s),
            other => Err(mismatch("string", other)),
        }
    }

    pub fn as_slot(&self) -> Result<usize> {
        match self {
            Self::Slot(idx) => Ok(*idx),
            other => Err(mismatch("pointer to a local slot", other)),
        }
    }
}

pub(crate) fn mismatch(expected: &'static str, found: &RtValue) -> Error {
    Error::TypeMismatch {
        expected,
        found: found.kind().to_string(),
    }
}

fn list(text: &str) -> impl Iterator<Item = &str> {
    text.trim_start_matches('[')
        .trim_end_matches(']')
        .split([',', ' '])
        .filter(|s| !s.is_empty())
}

fn parse_real(text: &str) -> Option<f64> {
    match text {
        "nan" | "NaN" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

/// Sign-extend the low `bits` bits of `value`.
pub(crate) const fn truncate(value: i64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return value;
    }
    let shift = 64 - bits;
    (value << shift) >> shift
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn round_f32(value: f64) -> f64 {
    f64::from(value as f32)
}

impl fmt::Display for RtValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) | Self::Double(v) => write!(f, "{v}"),
            Self::IntArray(vs) => write!(f, "{vs:?}"),
            Self::DoubleArray(vs) => write!(f, "{vs:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Slot(idx) => write!(f, "slot#{idx}"),
            Self::Void => write!(f, "void"),
        }
    }
}
