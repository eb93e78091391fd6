//! Metrics descriptions and an in-memory recorder for CLI summaries.
//!
//! The pass and the runtime record through the `metrics` facade; without
//! an installed recorder those calls are no-ops.

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    describe_counter, describe_histogram,
};
use parking_lot::RwLock;

// ============================================================================
// Metric descriptions
// ============================================================================

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        "dtrace_functions_instrumented_total",
        Unit::Count,
        "Functions that received entry/exit hooks"
    );
    describe_counter!(
        "dtrace_entry_sites_total",
        Unit::Count,
        "Entry hook calls inserted"
    );
    describe_counter!(
        "dtrace_exit_sites_total",
        Unit::Count,
        "Exit hook calls inserted (one per return)"
    );
    describe_counter!(
        "dtrace_functions_filtered_total",
        Unit::Count,
        "Defined functions rejected by the trace filter"
    );
    describe_counter!(
        "dtrace_trace_records_total",
        Unit::Count,
        "Trace records written by the runtime"
    );
    describe_histogram!(
        "dtrace_pass_duration_seconds",
        Unit::Seconds,
        "Time spent instrumenting one module"
    );
}

// ============================================================================
// CLI Recorder for terminal output
// ============================================================================

#[derive(Default)]
struct Storage {
    counters: RwLock<BTreeMap<String, u64>>,
    histograms: RwLock<BTreeMap<String, Vec<f64>>>,
}

struct CliCounter {
    key: String,
    storage: Arc<Storage>,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        *self.storage.counters.write().entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        self.storage.counters.write().insert(self.key.clone(), value);
    }
}

struct CliHistogram {
    key: String,
    storage: Arc<Storage>,
}

impl metrics::HistogramFn for CliHistogram {
    fn record(&self, value: f64) {
        self.storage
            .histograms
            .write()
            .entry(self.key.clone())
            .or_default()
            .push(value);
    }
}

/// Recorder that keeps counters and histograms in memory.
#[derive(Default)]
pub struct CliRecorder {
    storage: Arc<Storage>,
}

impl CliRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the global recorder.
    ///
    /// Returns `None` if a recorder is already installed.
    pub fn install(self) -> Option<CliRecorderHandle> {
        let storage = Arc::clone(&self.storage);
        metrics::set_global_recorder(self).ok()?;
        Some(CliRecorderHandle { storage })
    }
}

fn key_to_string(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|l| format!("{}={}", l.key(), l.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            storage: Arc::clone(&self.storage),
        }))
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CliHistogram {
            key: key_to_string(key),
            storage: Arc::clone(&self.storage),
        }))
    }
}

/// Access to metrics recorded by an installed `CliRecorder`.
pub struct CliRecorderHandle {
    storage: Arc<Storage>,
}

impl CliRecorderHandle {
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.storage.counters.read().get(key).copied()
    }

    /// Print all collected metrics, sorted by key.
    pub fn print_summary(&self) {
        let counters = self.storage.counters.read();
        let histograms = self.storage.histograms.read();
        if counters.is_empty() && histograms.is_empty() {
            println!("No metrics collected.");
            return;
        }

        println!();
        println!("## Metrics Summary");
        println!();
        if !counters.is_empty() {
            println!("### Counters");
            for (key, value) in counters.iter() {
                println!("  {key}: {value}");
            }
            println!();
        }
        if !histograms.is_empty() {
            println!("### Histograms");
            for (key, values) in histograms.iter() {
                let total: f64 = values.iter().sum();
                println!("  {key}: n={} total={total:.6}", values.len());
            }
            println!();
        }
    }
}
