//! C ABI hooks called by instrumented native code.
//!
//! Instrumented code calls the variadic `dtrace_hook_func_begin` at
//! function entry and `dtrace_hook_func_end` before each return, passing
//! the number of traced variables, the record name (`..<function>:::ENTER`
//! or `..<function>:::EXIT0`) and that many (name, tag, value) triples.
//! Those two symbols live in the C shim (`csrc/dtrace_hook.c`), which reads
//! the `va_list` by tag into an array of `FfiTraceArg` and calls
//! `dtrace_record_func_begin` / `dtrace_record_func_end` below.
//!
//! All hooks write through the process-global writer (see [`global`]).
//!
//! # Safety
//!
//! The caller (C code) must ensure:
//! - `name` is a valid NUL-terminated string
//! - `args` points to at least `count` initialized `FfiTraceArg` values
//! - every string and array referenced by an argument outlives the call

use std::ffi::{CStr, c_char, c_void};
use std::sync::OnceLock;

use tracing::warn;

use crate::error::{Result, RuntimeError};
use crate::tag;
use crate::value::{TraceValue, TraceVar};
use crate::writer::{RecordKind, TraceWriter};

/// Environment variable naming the trace file of the global writer.
pub const TRACE_FILE_ENV: &str = "DTRACE_FILE";

/// Symbol of the fault-injection hook.
pub const FAULT_INJECTION_HOOK: &str = "dtrace_hook_fault_injection";

/// Trace file used when `DTRACE_FILE` is not set.
pub const DEFAULT_TRACE_FILE: &str = "program.dtrace";

static GLOBAL_WRITER: OnceLock<TraceWriter> = OnceLock::new();

/// Process-global writer used by the C hooks.
///
/// The path is read from `DTRACE_FILE` on first use.
pub fn global() -> &'static TraceWriter {
    GLOBAL_WRITER.get_or_init(|| {
        let path = std::env::var_os(TRACE_FILE_ENV)
            .unwrap_or_else(|| DEFAULT_TRACE_FILE.into());
        TraceWriter::new(path)
    })
}

/// Raw value slot of an `FfiTraceArg`; which field is live depends on the tag.
#[repr(C)]
#[derive(Clone, Copy)]
pub union FfiTraceValue {
    /// `int`, `char`.
    pub int: i64,
    /// `float`, `double` (floats are widened by the caller).
    pub real: f64,
    /// `int[]` (`*const i64`), `double[]` (`*const f64`), `char*`.
    pub ptr: *const c_void,
}

/// One (name, type tag, value) triple.
///
/// ```c
/// typedef struct DtraceArg {
///     const char* name;
///     const char* tag;
///     union { int64_t i; double d; const void* p; } value;
///     size_t len;   /* element count for int[] / double[] */
/// } DtraceArg;
/// ```
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FfiTraceArg {
    pub name: *const c_char,
    pub tag: *const c_char,
    pub value: FfiTraceValue,
    pub len: usize,
}

/// Borrow a C string as UTF-8.
///
/// # Safety
/// `ptr` must be null or a valid NUL-terminated string living for `'a`.
unsafe fn c_str<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(RuntimeError::NullPointer);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| RuntimeError::InvalidUtf8)
}

/// Build a slice from a possibly-null array pointer.
///
/// # Safety
/// Non-null `ptr` must point to `len` initialized elements living for `'a`.
unsafe fn slice<'a, T>(ptr: *const c_void, len: usize) -> Result<&'a [T]> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(RuntimeError::NullPointer);
    }
    Ok(unsafe { std::slice::from_raw_parts(ptr.cast::<T>(), len) })
}

/// Decode one argument triple.
///
/// # Safety
/// See the module-level contract.
unsafe fn decode_arg<'a>(arg: &FfiTraceArg) -> Result<TraceVar<'a>> {
    unsafe {
        let name = c_str(arg.name)?;
        let type_tag = c_str(arg.tag)?;
        let value = match type_tag {
            tag::INT => TraceValue::Int(arg.value.int),
            tag::CHAR => TraceValue::Char(arg.value.int),
            tag::FLOAT => TraceValue::Float(arg.value.real),
            tag::DOUBLE => TraceValue::Double(arg.value.real),
            tag::INT_ARRAY => TraceValue::IntArray(slice(arg.value.ptr, arg.len)?),
            tag::DOUBLE_ARRAY => TraceValue::DoubleArray(slice(arg.value.ptr, arg.len)?),
            tag::C_STR => TraceValue::Str(c_str(arg.value.ptr.cast())?),
            other => return Err(RuntimeError::UnknownTag(other.to_string())),
        };
        Ok(TraceVar::new(name, value))
    }
}

/// Decode a hook's argument array, skipping triples that cannot be decoded.
///
/// # Safety
/// See the module-level contract.
pub(crate) unsafe fn decode_args<'a>(count: i32, args: *const FfiTraceArg) -> Vec<TraceVar<'a>> {
    let count = usize::try_from(count).unwrap_or(0);
    if count == 0 || args.is_null() {
        return Vec::new();
    }
    let raw = unsafe { std::slice::from_raw_parts(args, count) };
    raw.iter()
        .filter_map(|arg| match unsafe { decode_arg(arg) } {
            Ok(var) => Some(var),
            Err(err) => {
                warn!(%err, "skipping trace argument");
                None
            }
        })
        .collect()
}

unsafe fn hook(kind: RecordKind, count: i32, name: *const c_char, args: *const FfiTraceArg) {
    let name = match unsafe { c_str(name) } {
        Ok(name) => name,
        Err(err) => {
            warn!(%err, "skipping trace record with invalid name");
            return;
        }
    };
    let vars = unsafe { decode_args(count, args) };
    global().on_record(kind, name, &vars);
}

// =============================================================================
// FFI Exports - called by instrumented code
// =============================================================================

/// Record a function entry from a decoded argument array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtrace_record_func_begin(
    count: i32,
    name: *const c_char,
    args: *const FfiTraceArg,
) {
    unsafe { hook(RecordKind::Enter, count, name, args) }
}

/// Record a function exit from a decoded argument array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtrace_record_func_end(
    count: i32,
    name: *const c_char,
    args: *const FfiTraceArg,
) {
    unsafe { hook(RecordKind::Exit, count, name, args) }
}

/// Mark a fault injection point in the trace.
#[unsafe(no_mangle)]
pub extern "C" fn dtrace_hook_fault_injection() {
    global().on_fault_injection();
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;
    use std::ptr;

    use super::*;

    fn arg(name: &CStr, type_tag: &CStr, value: FfiTraceValue, len: usize) -> FfiTraceArg {
        FfiTraceArg {
            name: name.as_ptr(),
            tag: type_tag.as_ptr(),
            value,
            len,
        }
    }

    #[test]
    fn test_decode_scalars_and_arrays() {
        let xs = [1_i64, 2, 3];
        let ds = [0.5_f64, f64::NAN];
        let msg = CString::new("hi there").unwrap();
        let args = [
            arg(c"a", c"int", FfiTraceValue { int: 5 }, 0),
            arg(c"x", c"double", FfiTraceValue { real: 1.25 }, 0),
            arg(c"xs", c"int[]", FfiTraceValue { ptr: xs.as_ptr().cast() }, xs.len()),
            arg(c"ds", c"double[]", FfiTraceValue { ptr: ds.as_ptr().cast() }, ds.len()),
            arg(c"s", c"char*", FfiTraceValue { ptr: msg.as_ptr().cast() }, 0),
        ];

        let vars = unsafe { decode_args(5, args.as_ptr()) };
        assert_eq!(vars.len(), 5);
        assert_eq!(vars[0], TraceVar::new("a", TraceValue::Int(5)));
        assert_eq!(vars[1].value.render(), "1.250000");
        assert_eq!(vars[2].value.render(), "[ 1 2 3 ]");
        assert_eq!(vars[3].value.render(), "[ 0.500000 NaN ]");
        assert_eq!(vars[4].value, TraceValue::Str("hi there"));
    }

    #[test]
    fn test_decode_skips_bad_triples() {
        let args = [
            arg(c"p", c"float*", FfiTraceValue { int: 0 }, 0),
            arg(c"xs", c"int[]", FfiTraceValue { ptr: ptr::null() }, 4),
            arg(c"b", c"int", FfiTraceValue { int: -1 }, 0),
        ];
        let vars = unsafe { decode_args(3, args.as_ptr()) };
        assert_eq!(vars, vec![TraceVar::new("b", TraceValue::Int(-1))]);
    }

    #[test]
    fn test_decode_empty() {
        assert!(unsafe { decode_args(0, ptr::null()) }.is_empty());
        assert!(unsafe { decode_args(-3, ptr::null()) }.is_empty());
        assert!(unsafe { decode_args(2, ptr::null()) }.is_empty());
    }
}
