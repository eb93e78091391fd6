//! Serialized trace file writer.
//!
//! Every hook runs one critical section: acquire the lock, open the trace
//! file in append mode, write a whole record, close, release. Records from
//! different threads therefore never interleave.
//!
//! Each record carries an invocation nonce equal to the calling thread's
//! identifier plus its current call depth. An ENTER record and its matching
//! EXIT0 record share a nonce; nonces are not unique across threads.

use std::cell::Cell;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use parking_lot::{Mutex, MutexGuard};
use tracing::{trace, warn};

use crate::value::TraceVar;

/// Format header shared by declaration and trace files.
pub const TRACE_HEADER: &str = "input-language C/C++\ndecl-version 2.0\nvar-comparability none\n\n";

/// Line separating the record name from its nonce.
pub const NONCE_LABEL: &str = "this_invocation_nonce";

/// Line written by the fault-injection hook.
pub const FAULT_INJECTION_MARKER: &str = "FaultInjection";

/// Bits reserved for call depth below the thread identifier.
const THREAD_ID_SHIFT: u32 = 16;

static NEXT_THREAD_SEQ: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: Cell<u64> = const { Cell::new(0) };
    static CALL_DEPTH: Cell<i64> = const { Cell::new(0) };
}

/// Identifier of the calling thread, assigned on first use.
///
/// Never zero, which is reserved for "no lock owner".
pub fn thread_id() -> u64 {
    THREAD_ID.with(|id| {
        if id.get() == 0 {
            let seq = NEXT_THREAD_SEQ.fetch_add(1, Ordering::Relaxed);
            id.set(seq << THREAD_ID_SHIFT);
        }
        id.get()
    })
}

/// Current traced call depth of the calling thread.
pub fn call_depth() -> i64 {
    CALL_DEPTH.with(Cell::get)
}

fn adjust_depth(delta: i64) {
    CALL_DEPTH.with(|d| d.set(d.get() + delta));
}

/// Nonce for a record written now by the calling thread.
pub fn current_nonce() -> i64 {
    i64::try_from(thread_id()).unwrap_or(i64::MAX) + call_depth()
}

/// Kind of record being written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Enter,
    Exit,
}

#[derive(Debug, Default)]
struct WriterState {
    header_written: bool,
    records: u64,
}

/// Lock guard that also tracks which thread holds the lock.
struct Section<'a> {
    state: MutexGuard<'a, WriterState>,
    owner: &'a AtomicU64,
}

impl Deref for Section<'_> {
    type Target = WriterState;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl DerefMut for Section<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.state
    }
}

impl Drop for Section<'_> {
    fn drop(&mut self) {
        self.owner.store(0, Ordering::Release);
    }
}

/// Process-scoped trace writer.
///
/// Owns the output path, the lock serializing all writers, and the
/// header-written flag.
#[derive(Debug)]
pub struct TraceWriter {
    path: PathBuf,
    state: Mutex<WriterState>,
    owner: AtomicU64,
}

impl TraceWriter {
    /// Create a writer appending to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(WriterState::default()),
            owner: AtomicU64::new(0),
        }
    }

    /// Trace file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> u64 {
        self.state.lock().records
    }

    /// Check if the calling thread currently holds the writer lock.
    pub fn is_current_owner(&self) -> bool {
        self.owner.load(Ordering::Acquire) == thread_id()
    }

    fn lock(&self) -> Section<'_> {
        let state = self.state.lock();
        self.owner.store(thread_id(), Ordering::Release);
        Section {
            state,
            owner: &self.owner,
        }
    }

    /// Write the format header unless this writer already did.
    pub fn write_header_once(&self) {
        let mut section = self.lock();
        self.header_locked(&mut section);
    }

    fn header_locked(&self, section: &mut Section<'_>) {
        if section.header_written {
            return;
        }
        // The flag is consumed even if the file cannot be opened.
        section.header_written = true;
        if let Err(err) = self.append(TRACE_HEADER.as_bytes()) {
            warn!(path = %self.path.display(), %err, "cannot write trace header");
        }
    }

    /// Record a traced function entry.
    pub fn on_entry(&self, name: &str, vars: &[TraceVar<'_>]) {
        let mut section = self.lock();
        self.header_locked(&mut section);

        let Some(mut file) = self.open() else {
            return;
        };
        let record = render_record(name, current_nonce(), vars);
        match file.write_all(record.as_bytes()) {
            Ok(()) => {
                section.records += 1;
                counter!("dtrace_trace_records_total", "kind" => "enter").increment(1);
                trace!(record = name, depth = call_depth(), "entry record");
            }
            Err(err) => warn!(path = %self.path.display(), %err, "cannot write entry record"),
        }
        drop(file);
        adjust_depth(1);
    }

    /// Record a traced function exit.
    ///
    /// The last variable is conventionally the `return` slot when the
    /// function returns a traced type.
    pub fn on_exit(&self, name: &str, vars: &[TraceVar<'_>]) {
        let mut section = self.lock();

        let Some(mut file) = self.open() else {
            return;
        };
        adjust_depth(-1);
        let record = render_record(name, current_nonce(), vars);
        match file.write_all(record.as_bytes()) {
            Ok(()) => {
                section.records += 1;
                counter!("dtrace_trace_records_total", "kind" => "exit").increment(1);
                trace!(record = name, depth = call_depth(), "exit record");
            }
            Err(err) => warn!(path = %self.path.display(), %err, "cannot write exit record"),
        }
    }

    /// Dispatch on record kind.
    pub fn on_record(&self, kind: RecordKind, name: &str, vars: &[TraceVar<'_>]) {
        match kind {
            RecordKind::Enter => self.on_entry(name, vars),
            RecordKind::Exit => self.on_exit(name, vars),
        }
    }

    /// Mark the point where a fault was injected.
    pub fn on_fault_injection(&self) {
        let _section = self.lock();
        if let Err(err) = self.append(format!("{FAULT_INJECTION_MARKER}\n").as_bytes()) {
            warn!(path = %self.path.display(), %err, "cannot write fault marker");
        }
    }

    fn open(&self) -> Option<std::fs::File> {
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => Some(file),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "cannot open trace file");
                None
            }
        }
    }

    fn append(&self, bytes: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(bytes)
    }
}

/// Render one complete record, blank-line terminated.
pub fn render_record(name: &str, nonce: i64, vars: &[TraceVar<'_>]) -> String {
    let mut out = String::new();
    out.push_str(name);
    out.push('\n');
    out.push_str(NONCE_LABEL);
    out.push('\n');
    out.push_str(&nonce.to_string());
    out.push('\n');
    for var in vars {
        out.push_str(var.name);
        out.push('\n');
        out.push_str(&var.value.render());
        out.push('\n');
        out.push_str("1\n");
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TraceValue;

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_render_record_layout() {
        let vars = [
            TraceVar::new("a", TraceValue::Int(2)),
            TraceVar::new("xs", TraceValue::DoubleArray(&[0.5, f64::NAN])),
        ];
        let record = render_record("..f:::ENTER", 7, &vars);
        assert_eq!(
            record,
            "..f:::ENTER\nthis_invocation_nonce\n7\na\n2\n1\nxs\n[ 0.500000 NaN ]\n1\n\n"
        );
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.dtrace");
        let writer = TraceWriter::new(&path);

        writer.write_header_once();
        writer.on_entry("..f:::ENTER", &[]);
        writer.on_exit("..f:::EXIT0", &[]);
        writer.write_header_once();

        let text = read(&path);
        assert_eq!(text.matches("decl-version 2.0").count(), 1);
        assert!(text.starts_with(TRACE_HEADER));
        assert_eq!(writer.records_written(), 2);
    }

    #[test]
    fn test_entry_and_exit_share_nonce() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.dtrace");
        let writer = TraceWriter::new(&path);
        let base = call_depth();

        writer.on_entry("..outer:::ENTER", &[]);
        writer.on_entry("..inner:::ENTER", &[]);
        assert_eq!(call_depth(), base + 2);
        writer.on_exit("..inner:::EXIT0", &[]);
        writer.on_exit("..outer:::EXIT0", &[]);
        assert_eq!(call_depth(), base);

        let text = read(&path);
        let nonce_of = |name: &str| -> i64 {
            let mut lines = text.lines();
            lines.find(|l| *l == name).unwrap();
            assert_eq!(lines.next(), Some(NONCE_LABEL));
            lines.next().unwrap().parse().unwrap()
        };
        assert_eq!(nonce_of("..outer:::ENTER"), nonce_of("..outer:::EXIT0"));
        assert_eq!(nonce_of("..inner:::ENTER"), nonce_of("..inner:::EXIT0"));
        assert_eq!(nonce_of("..inner:::ENTER"), nonce_of("..outer:::ENTER") + 1);
    }

    #[test]
    fn test_unwritable_path_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("program.dtrace");
        let writer = TraceWriter::new(&path);
        let base = call_depth();

        writer.on_entry("..f:::ENTER", &[TraceVar::new("a", TraceValue::Int(1))]);
        writer.on_exit("..f:::EXIT0", &[]);
        writer.on_fault_injection();

        assert!(!path.exists());
        assert_eq!(writer.records_written(), 0);
        assert_eq!(call_depth(), base);
    }

    #[test]
    fn test_lock_owner_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TraceWriter::new(dir.path().join("t"));
        assert!(!writer.is_current_owner());
        {
            let _section = writer.lock();
            assert!(writer.is_current_owner());
        }
        assert!(!writer.is_current_owner());
    }

    #[test]
    fn test_fault_injection_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.dtrace");
        let writer = TraceWriter::new(&path);
        writer.on_fault_injection();
        assert_eq!(read(&path), "FaultInjection\n");
    }

    #[test]
    fn test_thread_ids_are_distinct() {
        let here = thread_id();
        let there = std::thread::spawn(thread_id).join().unwrap();
        assert_ne!(here, there);
        assert_ne!(here, 0);
        assert_eq!(here & ((1 << THREAD_ID_SHIFT) - 1), 0);
    }
}
