//! End-to-end tests: instrument textual IR, interpret it, check the
//! declaration and trace files.

use std::fs;
use std::path::Path;

use dtrace::{
    FilterSpec, PassConfig, Pipeline, RtValue, RunConfig, TRACE_HEADER, TraceWriter, Type,
    parse_module,
};
use dtrace_ir::InstrKind;

const ADD: &str = r#"
module "add.c"

define i32 @add(i32 %a, i32 %b) {
entry:
  %sum = add i32 %a, %b
  ret i32 %sum
}

define i32 @main() {
entry:
  %r = call i32 @add(i32 2, i32 3)
  ret i32 %r
}

define i32 @shaHash(i32 %x) {
entry:
  %y = mul i32 %x, 31
  ret i32 %y
}

define void @observe(double* %xs, i8* %label) {
entry:
  ret void
}
"#;

fn instrumented(dir: &Path) -> Pipeline {
    let mut pipeline = Pipeline::from_text(ADD, "add.c").unwrap();
    let config = PassConfig::default().with_decls(dir.join("program.decls"));
    pipeline.instrument_with(config, &FilterSpec::default()).unwrap();
    pipeline
}

fn record(name: &str, nonce: i64, vars: &[(&str, &str)]) -> String {
    let mut out = format!("{name}\nthis_invocation_nonce\n{nonce}\n");
    for (var, value) in vars {
        out.push_str(&format!("{var}\n{value}\n1\n"));
    }
    out.push('\n');
    out
}

#[test]
fn test_add_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = instrumented(dir.path());
    let trace_path = dir.path().join("program.dtrace");
    let writer = TraceWriter::new(&trace_path);

    let nonce = dtrace_rt::current_nonce();
    let result = pipeline
        .run("add", &["2".to_string(), "3".to_string()], &writer, RunConfig::default())
        .unwrap();
    assert_eq!(result, RtValue::Int(5));

    let expected = format!(
        "{TRACE_HEADER}{}{}",
        record("..add:::ENTER", nonce, &[("a", "2"), ("b", "3")]),
        record("..add:::EXIT0", nonce, &[("a", "2"), ("b", "3"), ("return", "5")]),
    );
    assert_eq!(fs::read_to_string(&trace_path).unwrap(), expected);
}

#[test]
fn test_add_declarations() {
    let dir = tempfile::tempdir().unwrap();
    instrumented(dir.path());
    let decls = fs::read_to_string(dir.path().join("program.decls")).unwrap();

    let param = |name: &str| {
        format!(" variable {name}\n  var-kind variable\n  rep-type int\n  dec-type int\n  flags is_param\n")
    };
    let enter = format!("ppt ..add:::ENTER\n ppt-type enter\n{}{}\n", param("a"), param("b"));
    let exit = format!(
        "ppt ..add:::EXIT0\n ppt-type subexit\n{}{} variable return\n  var-kind variable\n  rep-type int\n  dec-type int\n\n",
        param("a"),
        param("b")
    );
    assert!(decls.starts_with(TRACE_HEADER));
    assert!(decls.contains(&format!("{enter}{exit}")));
    assert!(decls.contains("ppt ..main():::ENTER\n ppt-type enter\n\n"));
    assert!(!decls.contains("shaHash"));
}

#[test]
fn test_nested_calls_pair_nonces() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = instrumented(dir.path());
    let trace_path = dir.path().join("program.dtrace");
    let writer = TraceWriter::new(&trace_path);

    let nonce = dtrace_rt::current_nonce();
    let result = pipeline.run("main", &[], &writer, RunConfig::default()).unwrap();
    assert_eq!(result, RtValue::Int(5));
    assert_eq!(dtrace_rt::current_nonce(), nonce);

    let expected = format!(
        "{TRACE_HEADER}{}{}{}{}",
        record("..main():::ENTER", nonce, &[]),
        record("..add:::ENTER", nonce + 1, &[("a", "2"), ("b", "3")]),
        record("..add:::EXIT0", nonce + 1, &[("a", "2"), ("b", "3"), ("return", "5")]),
        record("..main():::EXIT0", nonce, &[("return", "5")]),
    );
    assert_eq!(fs::read_to_string(&trace_path).unwrap(), expected);
}

#[test]
fn test_nan_in_double_array() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = instrumented(dir.path());
    let trace_path = dir.path().join("program.dtrace");
    let writer = TraceWriter::new(&trace_path);

    pipeline
        .run(
            "observe",
            &["1.5, nan, -2".to_string(), "ignored".to_string()],
            &writer,
            RunConfig::default(),
        )
        .unwrap();

    let trace = fs::read_to_string(&trace_path).unwrap();
    assert!(trace.contains("..observe:::ENTER\nthis_invocation_nonce\n"));
    assert!(trace.contains("xs\n[ 1.500000 NaN -2.000000 ]\n1\n"));
    assert!(!trace.contains("label"));
}

#[test]
fn test_denylisted_function_not_traced() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = instrumented(dir.path());
    let trace_path = dir.path().join("program.dtrace");
    let writer = TraceWriter::new(&trace_path);

    let result = pipeline
        .run("shaHash", &["2".to_string()], &writer, RunConfig::default())
        .unwrap();
    assert_eq!(result, RtValue::Int(62));
    assert_eq!(writer.records_written(), 0);
    assert!(!trace_path.exists());
}

#[test]
fn test_printed_ir_runs_the_same() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = instrumented(dir.path());
    let text = pipeline.module.to_string();
    assert!(text.contains("declare void @dtrace_hook_func_begin(i32, ...)"));

    let reparsed = Pipeline::from_text(&text, "ignored").unwrap();
    assert_eq!(reparsed.module, pipeline.module);
    assert_eq!(parse_module(&text, "x").unwrap().name, "add.c");

    let writer = TraceWriter::new(dir.path().join("again.dtrace"));
    let result = reparsed
        .run("add", &["2".to_string(), "3".to_string()], &writer, RunConfig::default())
        .unwrap();
    assert_eq!(result, RtValue::Int(5));
    assert_eq!(writer.records_written(), 2);
}

#[test]
fn test_hook_values_use_promoted_widths() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = instrumented(dir.path());
    let hooks = [dtrace_pass::ENTRY_HOOK, dtrace_pass::EXIT_HOOK];

    let mut calls = 0;
    for func in pipeline.module.defined_functions() {
        for instr in func.blocks.iter().flat_map(|b| &b.instructions) {
            let InstrKind::Call { callee, args, .. } = &instr.kind else {
                continue;
            };
            if !hooks.contains(&callee.as_str()) {
                continue;
            }
            calls += 1;
            assert_eq!(args[0].ty, Type::I32);
            for value in args[2..].iter().skip(2).step_by(3) {
                assert!(
                    matches!(value.ty, Type::Int(64) | Type::Double | Type::Ptr(_)),
                    "{callee} in {} passes {}",
                    func.name,
                    value.ty
                );
            }
        }
    }
    // add, main and observe each get one entry and one exit call
    assert_eq!(calls, 6);
}

#[test]
fn test_uninstrumented_module_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::from_text(ADD, "add.c").unwrap();
    let writer = TraceWriter::new(dir.path().join("program.dtrace"));
    pipeline
        .run("add", &["2".to_string(), "3".to_string()], &writer, RunConfig::default())
        .unwrap();
    assert_eq!(writer.records_written(), 0);
}
