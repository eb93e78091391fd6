//! Type-tagged trace values and their text rendering.

use std::fmt::Write as _;

use crate::tag;

/// A single value handed to an entry/exit hook.
///
/// The variant is chosen by the type tag that precedes the value in the
/// hook's argument list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TraceValue<'a> {
    Int(i64),
    Char(i64),
    Float(f64),
    Double(f64),
    IntArray(&'a [i64]),
    DoubleArray(&'a [f64]),
    Str(&'a str),
}

impl TraceValue<'_> {
    /// Type tag of this value.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Int(_) => tag::INT,
            Self::Char(_) => tag::CHAR,
            Self::Float(_) => tag::FLOAT,
            Self::Double(_) => tag::DOUBLE,
            Self::IntArray(_) => tag::INT_ARRAY,
            Self::DoubleArray(_) => tag::DOUBLE_ARRAY,
            Self::Str(_) => tag::C_STR,
        }
    }

    /// Render the value the way the trace file expects it.
    ///
    /// Scalars print like C's `%d` / `%f`; arrays print as `[ a b c ]`
    /// with NaN elements spelled `NaN`; strings are copied verbatim.
    pub fn render(&self) -> String {
        match self {
            Self::Int(v) | Self::Char(v) => v.to_string(),
            Self::Float(v) | Self::Double(v) => render_real(*v),
            Self::IntArray(values) => {
                let mut out = String::from("[");
                for v in *values {
                    let _ = write!(out, " {v}");
                }
                out.push_str(" ]");
                out
            }
            Self::DoubleArray(values) => {
                let mut out = String::from("[");
                for v in *values {
                    out.push(' ');
                    out.push_str(&render_real(*v));
                }
                out.push_str(" ]");
                out
            }
            Self::Str(s) => (*s).to_string(),
        }
    }
}

fn render_real(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{v:.6}")
    }
}

/// A named value: one stanza of a trace record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceVar<'a> {
    pub name: &'a str,
    pub value: TraceValue<'a>,
}

impl<'a> TraceVar<'a> {
    pub const fn new(name: &'a str, value: TraceValue<'a>) -> Self {
        Self { name, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_scalars() {
        assert_eq!(TraceValue::Int(-42).render(), "-42");
        assert_eq!(TraceValue::Char(65).render(), "65");
        assert_eq!(TraceValue::Float(1.5).render(), "1.500000");
        assert_eq!(TraceValue::Double(2.0 / 3.0).render(), "0.666667");
        assert_eq!(TraceValue::Str("hello world").render(), "hello world");
    }

    #[test]
    fn test_render_arrays() {
        assert_eq!(TraceValue::IntArray(&[1, 2, 3]).render(), "[ 1 2 3 ]");
        assert_eq!(TraceValue::IntArray(&[]).render(), "[ ]");
        assert_eq!(
            TraceValue::DoubleArray(&[1.0, f64::NAN, -0.25]).render(),
            "[ 1.000000 NaN -0.250000 ]"
        );
    }

    #[test]
    fn test_tags() {
        assert_eq!(TraceValue::DoubleArray(&[]).tag(), "double[]");
        assert_eq!(TraceValue::Str("s").tag(), tag::C_STR);
        assert_eq!(TraceValue::Char(7).tag(), "char");
    }
}
