//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dtrace::{FilterSpec, PassConfig};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "dtrace")]
#[command(about = "Entry/exit value tracing for typed IR modules")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log directive for the chosen verbosity.
    pub const fn log_directive(&self) -> &'static str {
        if self.verbose {
            "dtrace=debug"
        } else if self.silent {
            "dtrace=error"
        } else {
            "dtrace=info"
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover traceable functions and write the coordination file
    Discover {
        /// Input IR file
        #[arg(value_name = "IR")]
        input: PathBuf,

        /// Coordination file to write
        #[arg(long, default_value = "ProgramPoints.ppts")]
        points: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Instrument a module and write the result as IR
    Instrument {
        /// Input IR file
        #[arg(value_name = "IR")]
        input: PathBuf,

        /// Output IR file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        pass: PassArgs,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Interpret a function, writing the trace of hooked calls
    Run {
        /// Input IR file
        #[arg(value_name = "IR")]
        input: PathBuf,

        /// Function to call
        #[arg(long)]
        entry: String,

        /// Argument literal, one per parameter (arrays as "1,2,3")
        #[arg(long = "arg", value_name = "VALUE", allow_hyphen_values = true)]
        args: Vec<String>,

        /// Trace output file
        #[arg(long, default_value = dtrace_rt::DEFAULT_TRACE_FILE)]
        trace: PathBuf,

        /// Instrument the module before running it
        #[arg(long)]
        instrument: bool,

        /// Maximum nested call depth
        #[arg(long, default_value = "512")]
        max_depth: usize,

        #[command(flatten)]
        pass: PassArgs,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// List each function's traced variables and their type tags
    Classify {
        /// Input IR file
        #[arg(value_name = "IR")]
        input: PathBuf,

        /// Include functions rejected by the filter
        #[arg(long)]
        all: bool,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

/// Trace filter arguments.
#[derive(Args, Clone, Debug, Default)]
pub struct FilterArgs {
    /// Also skip functions whose name contains this substring
    #[arg(long = "deny", value_name = "SUBSTRING")]
    pub deny: Vec<String>,

    /// Only trace functions whose raw name matches this regex
    #[arg(long, value_name = "REGEX")]
    pub allow_regex: Option<String>,

    /// Never trace functions whose raw name matches this regex
    #[arg(long, value_name = "REGEX")]
    pub deny_regex: Option<String>,
}

impl From<&FilterArgs> for FilterSpec {
    fn from(args: &FilterArgs) -> Self {
        Self {
            deny: args.deny.clone(),
            allow_regex: args.allow_regex.clone(),
            deny_regex: args.deny_regex.clone(),
        }
    }
}

/// Instrumentation output arguments.
#[derive(Args, Clone, Debug)]
pub struct PassArgs {
    /// Declaration file to append to
    #[arg(long, default_value = dtrace_pass::DEFAULT_DECLS_FILE)]
    pub decls: PathBuf,

    /// Coordination file: loaded if it exists, otherwise written after discovery
    #[arg(long)]
    pub points: Option<PathBuf>,
}

impl From<&PassArgs> for PassConfig {
    fn from(args: &PassArgs) -> Self {
        Self {
            decls_path: args.decls.clone(),
            points_path: args.points.clone(),
            ..Self::default()
        }
    }
}
