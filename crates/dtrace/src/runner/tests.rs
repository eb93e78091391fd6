use std::fs;

use dtrace_ir::parse_module;

use super::*;

const PROGRAM: &str = r#"
module "calc.c"

@.greeting = internal constant c"hi"

define i32 @add(i32 %a, i32 %b) {
entry:
  %sum = add i32 %a, %b
  ret i32 %sum
}

define i32 @fact(i32 %n) {
entry:
  %acc = alloca i32
  store i32 1, i32* %acc
  %small = icmp sle i32 %n, 1
  br i1 %small, label %done, label %recurse
recurse:
  %m = sub i32 %n, 1
  %r = call i32 @fact(i32 %m)
  %p = mul i32 %n, %r
  store i32 %p, i32* %acc
  br label %done
done:
  %out = load i32, i32* %acc
  ret i32 %out
}

define double @half(double %x) {
entry:
  %h = fdiv double %x, 2.0
  ret double %h
}

define i8 @wrap(i8 %x) {
entry:
  %y = add i8 %x, 1
  ret i8 %y
}

define i32 @div(i32 %a, i32 %b) {
entry:
  %q = sdiv i32 %a, %b
  ret i32 %q
}

define i8* @greet() {
entry:
  ret i8* @.greeting
}

define void @spin() {
entry:
  br label %entry
}

define void @trap() {
entry:
  unreachable
}

define i32 @ext(i32 %x) {
entry:
  %r = call i32 @abs(i32 %x)
  ret i32 %r
}

define i64 @widen(i8 %x) {
entry:
  %w = sext i8 %x to i64
  ret i64 %w
}

define double @promote(float %k) {
entry:
  %d = fpext float %k to double
  ret double %d
}

define i32 @badcast(i32 %x) {
entry:
  %w = sext i32 %x to double
  ret i32 %x
}

declare i32 @abs(i32)
"#;

fn module() -> Module {
    parse_module(PROGRAM, "calc.c").unwrap()
}

fn writer() -> (tempfile::TempDir, TraceWriter) {
    let dir = tempfile::tempdir().unwrap();
    let writer = TraceWriter::new(dir.path().join("program.dtrace"));
    (dir, writer)
}

#[test]
fn test_arithmetic_and_recursion() {
    let module = module();
    let (_dir, writer) = writer();
    let runner = Runner::new(&module, &writer);

    assert_eq!(runner.call("add", vec![RtValue::Int(2), RtValue::Int(3)]).unwrap(), RtValue::Int(5));
    assert_eq!(runner.call("fact", vec![RtValue::Int(5)]).unwrap(), RtValue::Int(120));
    assert_eq!(runner.call("half", vec![RtValue::Double(3.0)]).unwrap(), RtValue::Double(1.5));
    assert_eq!(runner.call("wrap", vec![RtValue::Int(127)]).unwrap(), RtValue::Int(-128));
    assert_eq!(runner.call("greet", Vec::new()).unwrap(), RtValue::Str("hi".into()));
}

#[test]
fn test_widening_casts() {
    let module = module();
    let (_dir, writer) = writer();
    let runner = Runner::new(&module, &writer);

    assert_eq!(runner.call("widen", vec![RtValue::Int(-3)]).unwrap(), RtValue::Int(-3));
    assert_eq!(
        runner.call_with_literals("promote", &["0.25".to_string()]).unwrap(),
        RtValue::Double(0.25)
    );
    assert!(matches!(
        runner.call("badcast", vec![RtValue::Int(1)]),
        Err(Error::TypeMismatch { expected: "sext", .. })
    ));
}

#[test]
fn test_literal_arguments() {
    let module = module();
    let (_dir, writer) = writer();
    let runner = Runner::new(&module, &writer);
    let result = runner
        .call_with_literals("add", &["40".to_string(), "2".to_string()])
        .unwrap();
    assert_eq!(result, RtValue::Int(42));
    assert!(matches!(
        runner.call_with_literals("add", &["1".to_string()]),
        Err(Error::ArgumentCount { expected: 2, actual: 1, .. })
    ));
    assert!(matches!(
        runner.call_with_literals("add", &["x".to_string(), "1".to_string()]),
        Err(Error::BadLiteral { .. })
    ));
}

#[test]
fn test_runtime_errors() {
    let module = module();
    let (_dir, writer) = writer();
    let runner = Runner::new(&module, &writer);

    assert!(matches!(
        runner.call("div", vec![RtValue::Int(1), RtValue::Int(0)]),
        Err(Error::DivisionByZero)
    ));
    assert!(matches!(runner.call("trap", Vec::new()), Err(Error::Unreachable(_))));
    assert!(matches!(runner.call("nope", Vec::new()), Err(Error::UnknownFunction(_))));
    assert!(matches!(
        runner.call("ext", vec![RtValue::Int(-1)]),
        Err(Error::UnsupportedExtern(name)) if name == "abs"
    ));
    assert!(matches!(
        runner.call("add", vec![RtValue::Double(1.0), RtValue::Int(1)]),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test]
fn test_limits() {
    let module = module();
    let (_dir, writer) = writer();

    let config = RunConfig {
        max_steps: 1_000,
        ..RunConfig::default()
    };
    let runner = Runner::with_config(&module, &writer, config);
    assert!(matches!(runner.call("spin", Vec::new()), Err(Error::StepLimit(1_000))));

    let config = RunConfig {
        max_depth: 3,
        ..RunConfig::default()
    };
    let runner = Runner::with_config(&module, &writer, config);
    assert!(runner.call("fact", vec![RtValue::Int(3)]).is_ok());
    assert!(matches!(
        runner.call("fact", vec![RtValue::Int(10)]),
        Err(Error::StackOverflow(3))
    ));
}

#[test]
fn test_hooks_write_trace() {
    let text = r#"
module "m.c"
@.n = internal constant c"..inc:::ENTER"
@.x = internal constant c"..inc:::EXIT0"
@.v = internal constant c"v"
@.t = internal constant c"int"
@.r = internal constant c"return"

define i32 @inc(i32 %v) {
entry:
  call void @dtrace_hook_func_begin(i32 1, i8* @.n, i8* @.v, i8* @.t, i32 %v)
  %w = add i32 %v, 1
  call void @dtrace_hook_fault_injection()
  call void @dtrace_hook_func_end(i32 2, i8* @.x, i8* @.v, i8* @.t, i32 %v, i8* @.r, i8* @.t, i32 %w)
  ret i32 %w
}

declare void @dtrace_hook_func_begin(i32, ...)
declare void @dtrace_hook_func_end(i32, ...)
declare void @dtrace_hook_fault_injection()
"#;
    let module = parse_module(text, "m.c").unwrap();
    let (_dir, writer) = writer();
    let runner = Runner::new(&module, &writer);
    assert_eq!(runner.call("inc", vec![RtValue::Int(41)]).unwrap(), RtValue::Int(42));

    let trace = fs::read_to_string(writer.path()).unwrap();
    let body = trace.strip_prefix(dtrace_rt::TRACE_HEADER).unwrap();
    let lines: Vec<_> = body.lines().collect();
    assert_eq!(lines[0], "..inc:::ENTER");
    assert_eq!(&lines[3..6], ["v", "41", "1"]);
    assert_eq!(lines[7], "FaultInjection");
    assert_eq!(lines[8], "..inc:::EXIT0");
    assert_eq!(lines[2], lines[10]);
    assert_eq!(&lines[14..17], ["return", "42", "1"]);
    assert_eq!(writer.records_written(), 2);
}

#[test]
fn test_malformed_hook_call() {
    let text = r#"
define void @f() {
entry:
  call void @dtrace_hook_func_begin(i32 3)
  ret void
}
declare void @dtrace_hook_func_begin(i32, ...)
"#;
    let module = parse_module(text, "m.c").unwrap();
    let (_dir, writer) = writer();
    let runner = Runner::new(&module, &writer);
    assert!(matches!(runner.call("f", Vec::new()), Err(Error::BadHookCall(_))));
}
