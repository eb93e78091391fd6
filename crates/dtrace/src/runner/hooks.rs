//! Decoding of interpreted hook calls.
//!
//! Hook calls carry `count, record name, (name, tag, value) x count`. The
//! values are already evaluated; this module checks the shape and borrows
//! them as runtime `TraceVar`s.

use dtrace_rt::{TraceValue, TraceVar, tag};
use tracing::warn;

use super::value::RtValue;
use crate::{Error, Result};

/// Hook symbols the interpreter handles itself instead of calling.
#[derive(Clone, Debug)]
pub struct HookNames {
    pub entry: String,
    pub exit: String,
    pub fault: String,
}

impl Default for HookNames {
    fn default() -> Self {
        Self {
            entry: dtrace_pass::ENTRY_HOOK.to_string(),
            exit: dtrace_pass::EXIT_HOOK.to_string(),
            fault: dtrace_rt::FAULT_INJECTION_HOOK.to_string(),
        }
    }
}

/// A decoded hook call borrowing the evaluated arguments.
pub struct HookCall<'a> {
    pub record: &'a str,
    pub vars: Vec<TraceVar<'a>>,
}

/// Split evaluated hook arguments into a record name and variables.
///
/// The count must match the number of triples. Triples whose tag is
/// unknown, or whose value does not fit the tag, are skipped.
pub fn decode<'a>(hook: &str, args: &'a [RtValue]) -> Result<HookCall<'a>> {
    let bad = || Error::BadHookCall(hook.to_string());
    let [count, record, triples @ ..] = args else {
        return Err(bad());
    };
    let count = usize::try_from(count.as_int()?).map_err(|_| bad())?;
    if count.checked_mul(3) != Some(triples.len()) {
        return Err(bad());
    }
    let record = record.as_str()?;

    let vars = triples
        .chunks_exact(3)
        .filter_map(|triple| match to_var(triple) {
            Some(var) => Some(var),
            None => {
                warn!(record, "skipping trace argument with unsupported tag or value");
                None
            }
        })
        .collect();
    Ok(HookCall { record, vars })
}

fn to_var(triple: &[RtValue]) -> Option<TraceVar<'_>> {
    let [RtValue::Str(name), RtValue::Str(type_tag), value] = triple else {
        return None;
    };
    let value = match (type_tag.as_str(), value) {
        (tag::INT, RtValue::Int(v)) => TraceValue::Int(*v),
        (tag::CHAR, RtValue::Int(v)) => TraceValue::Char(*v),
        (tag::FLOAT, RtValue::Float(v) | RtValue::Double(v)) => TraceValue::Float(*v),
        (tag::DOUBLE, RtValue::Float(v) | RtValue::Double(v)) => TraceValue::Double(*v),
        (tag::INT_ARRAY, RtValue::IntArray(vs)) => TraceValue::IntArray(vs),
        (tag::DOUBLE_ARRAY, RtValue::DoubleArray(vs)) => TraceValue::DoubleArray(vs),
        (tag::C_STR, RtValue::Str(s)) => TraceValue::Str(s),
        _ => return None,
    };
    Some(TraceVar::new(name, value))
}
