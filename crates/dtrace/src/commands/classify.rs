//! Classify command.

use std::path::Path;

use dtrace::{FilterSpec, Injector, SemanticType, classify, qualified_name};

use crate::cli::FilterArgs;
use crate::terminal;

/// Handle the `classify` command.
///
/// Prints one section per defined function: every parameter with its tag,
/// marking the ones that are traced, then the return tag.
pub fn cmd_classify(input: &Path, all: bool, filter: &FilterArgs) -> dtrace::Result<()> {
    let module = dtrace::load_module(input)?;
    let filter = FilterSpec::from(filter).build()?;

    for func in module.functions.iter().filter(|f| !f.is_declaration()) {
        let traced = Injector::accepts(func, filter.as_ref());
        if !traced && !all {
            continue;
        }
        let suffix = if traced { "" } else { " (filtered)" };
        terminal::header(&format!("{}{suffix}", qualified_name(&func.name)));
        for param in &func.params {
            let tag = classify(&param.ty);
            println!("  {:<16} {:<10} {}", param.name.trim(), tag, marker(tag));
        }
        let ret = classify(&func.ret);
        if func.ret.is_void() {
            terminal::dim("returns void");
        } else {
            println!("  {:<16} {:<10} {}", "return", ret, marker(ret));
        }
    }
    Ok(())
}

const fn marker(tag: SemanticType) -> &'static str {
    if tag.is_instrumentable() { "traced" } else { "skipped" }
}
