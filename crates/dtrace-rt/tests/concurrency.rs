//! Concurrent writers must never interleave records.

use std::sync::Arc;
use std::thread;

use dtrace_rt::{NONCE_LABEL, TRACE_HEADER, TraceValue, TraceVar, TraceWriter};

const THREADS: usize = 8;
const CALLS: usize = 50;

#[test]
fn test_concurrent_entries_are_not_interleaved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.dtrace");
    let writer = Arc::new(TraceWriter::new(&path));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let writer = Arc::clone(&writer);
            thread::spawn(move || {
                let name = format!("..worker{t}:::ENTER");
                let values: Vec<i64> = (0..4).map(|i| (t * 10 + i) as i64).collect();
                for _ in 0..CALLS {
                    let vars = [
                        TraceVar::new("id", TraceValue::Int(t as i64)),
                        TraceVar::new("xs", TraceValue::IntArray(&values)),
                    ];
                    writer.on_entry(&name, &vars);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let text = std::fs::read_to_string(&path).unwrap();
    let body = text.strip_prefix(TRACE_HEADER).expect("header first");
    assert_eq!(text.matches("decl-version").count(), 1);

    let records: Vec<&str> = body
        .split("\n\n")
        .filter(|r| !r.trim().is_empty())
        .collect();
    assert_eq!(records.len(), THREADS * CALLS);

    for record in records {
        let lines: Vec<&str> = record.lines().collect();
        assert_eq!(lines.len(), 9, "malformed record: {record:?}");
        let t: usize = lines[0]
            .strip_prefix("..worker")
            .and_then(|rest| rest.strip_suffix(":::ENTER"))
            .and_then(|n| n.parse().ok())
            .expect("record name");
        assert_eq!(lines[1], NONCE_LABEL);
        assert!(lines[2].parse::<i64>().is_ok());
        assert_eq!(lines[3], "id");
        assert_eq!(lines[4], t.to_string());
        assert_eq!(lines[5], "1");
        assert_eq!(lines[6], "xs");
        let expected: Vec<String> = (0..4).map(|i| (t * 10 + i).to_string()).collect();
        assert_eq!(lines[7], format!("[ {} ]", expected.join(" ")));
        assert_eq!(lines[8], "1");
    }
    assert_eq!(writer.records_written(), (THREADS * CALLS) as u64);
}

#[test]
fn test_nonces_advance_with_depth_per_thread() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.dtrace");
    let writer = Arc::new(TraceWriter::new(&path));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let writer = Arc::clone(&writer);
            thread::spawn(move || {
                let base = dtrace_rt::current_nonce();
                writer.on_entry(&format!("..outer{t}:::ENTER"), &[]);
                writer.on_entry(&format!("..inner{t}:::ENTER"), &[]);
                writer.on_exit(&format!("..inner{t}:::EXIT0"), &[]);
                writer.on_exit(&format!("..outer{t}:::EXIT0"), &[]);
                base
            })
        })
        .collect();
    let bases: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let text = std::fs::read_to_string(&path).unwrap();
    let nonce_of = |name: &str| -> i64 {
        let mut lines = text.lines();
        lines.find(|l| *l == name).expect("record present");
        lines.nth(1).unwrap().parse().unwrap()
    };
    for (t, base) in bases.into_iter().enumerate() {
        assert_eq!(nonce_of(&format!("..outer{t}:::ENTER")), base);
        assert_eq!(nonce_of(&format!("..inner{t}:::ENTER")), base + 1);
        assert_eq!(nonce_of(&format!("..inner{t}:::EXIT0")), base + 1);
        assert_eq!(nonce_of(&format!("..outer{t}:::EXIT0")), base);
    }
}
