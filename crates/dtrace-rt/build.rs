//! Generates `dtrace_hook.h` and compiles the variadic hook shim.

use std::path::PathBuf;
use std::{env, fs};

#[path = "src/header.rs"]
mod header;
#[path = "src/tag.rs"]
mod tag;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/header.rs");
    println!("cargo:rerun-if-changed=src/tag.rs");
    println!("cargo:rerun-if-changed=csrc/dtrace_hook.c");

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo"));
    fs::write(out_dir.join(header::HEADER_NAME), header::hook_header())
        .expect("failed to write hook header");

    cc::Build::new()
        .file("csrc/dtrace_hook.c")
        .include(&out_dir)
        .std("c11")
        .warnings(true)
        .compile("dtrace_hook");
}
