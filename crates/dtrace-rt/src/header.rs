//! C header for the variadic hook shim.
//!
//! Instrumented code calls the hooks with C default-promoted varargs;
//! `csrc/dtrace_hook.c` reads them by tag into `DtraceArg` arrays and
//! forwards to the `dtrace_record_*` entry points. The header is generated
//! from the Rust side so the struct layout and tag strings match
//! `FfiTraceArg` and [`tag`](crate::tag).

use std::fmt::Write as _;

use crate::tag;

/// File name of the generated header.
pub const HEADER_NAME: &str = "dtrace_hook.h";

/// Triples past this count are dropped by the shim.
pub const MAX_HOOK_VARS: usize = 256;

const TAG_MACROS: [(&str, &str); 7] = [
    ("DTRACE_TAG_INT", tag::INT),
    ("DTRACE_TAG_CHAR", tag::CHAR),
    ("DTRACE_TAG_FLOAT", tag::FLOAT),
    ("DTRACE_TAG_DOUBLE", tag::DOUBLE),
    ("DTRACE_TAG_INT_ARRAY", tag::INT_ARRAY),
    ("DTRACE_TAG_DOUBLE_ARRAY", tag::DOUBLE_ARRAY),
    ("DTRACE_TAG_C_STR", tag::C_STR),
];

/// Generate `dtrace_hook.h`.
#[must_use]
pub fn hook_header() -> String {
    let mut out = String::from(
        r"/* dtrace runtime hook ABI. Generated by dtrace-rt; do not edit. */
#pragma once

#include <stddef.h>
#include <stdint.h>

",
    );
    let _ = writeln!(out, "#define DTRACE_MAX_VARS {MAX_HOOK_VARS}");
    out.push('\n');
    for (name, value) in TAG_MACROS {
        let _ = writeln!(out, "#define {name} \"{value}\"");
    }
    out.push_str(
        r"
/* Matches dtrace_rt::FfiTraceValue. */
typedef union DtraceValue {
    int64_t i;
    double d;
    const void* p;
} DtraceValue;

/* Matches dtrace_rt::FfiTraceArg. */
typedef struct DtraceArg {
    const char* name;
    const char* tag;
    DtraceValue value;
    size_t len;
} DtraceArg;

/* Implemented by dtrace-rt. */
extern void dtrace_record_func_begin(int32_t count, const char* name, const DtraceArg* args);
extern void dtrace_record_func_end(int32_t count, const char* name, const DtraceArg* args);
extern void dtrace_hook_fault_injection(void);

/*
 * Called by instrumented code:
 *   hook(count, const char* record, (const char* name, const char* tag, value) x count)
 * Integer values are passed as int64_t, float/double as double, arrays and
 * strings as pointers.
 */
extern void dtrace_hook_func_begin(int32_t count, ...);
extern void dtrace_hook_func_end(int32_t count, ...);
",
    );
    out
}
