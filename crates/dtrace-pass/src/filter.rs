//! Trace filters: which functions get instrumented.
//!
//! The registry, declaration emitter and injector only ever ask a
//! `TraceFilter`, so policies can be swapped without touching them.

use regex::Regex;
use rustc_hash::FxHashSet;

use crate::error::Result;

/// Decides whether a function is traced.
pub trait TraceFilter: Send + Sync {
    /// `raw_name` is the symbol name as it appears in the module.
    fn should_trace(&self, raw_name: &str) -> bool;
}

/// Prefix that marks fault-injection helpers.
pub const FAULT_INJECTION_PREFIX: &str = "injectFault";

/// Substrings of benchmark and hashing library internals.
pub const DEFAULT_DENY_SUBSTRINGS: [&str; 3] = ["parsec", "Not", "sha"];

/// Rejects names by prefix or substring.
#[derive(Clone, Debug)]
pub struct DenyList {
    prefixes: Vec<String>,
    substrings: Vec<String>,
}

impl DenyList {
    /// Create an empty deny list (traces everything).
    pub const fn empty() -> Self {
        Self {
            prefixes: Vec::new(),
            substrings: Vec::new(),
        }
    }

    /// Add a rejected prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Add a rejected substring.
    #[must_use]
    pub fn with_substring(mut self, substring: impl Into<String>) -> Self {
        self.substrings.push(substring.into());
        self
    }
}

impl Default for DenyList {
    /// Fault-injection helpers plus benchmark/hash internals, which either
    /// recurse into the hooks or are irrelevant to the traced program.
    fn default() -> Self {
        DEFAULT_DENY_SUBSTRINGS
            .iter()
            .fold(Self::empty().with_prefix(FAULT_INJECTION_PREFIX), |list, s| {
                list.with_substring(*s)
            })
    }
}

impl TraceFilter for DenyList {
    fn should_trace(&self, raw_name: &str) -> bool {
        !self.prefixes.iter().any(|p| raw_name.starts_with(p.as_str()))
            && !self.substrings.iter().any(|s| raw_name.contains(s.as_str()))
    }
}

/// Traces only the named functions.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    names: FxHashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl TraceFilter for AllowList {
    fn should_trace(&self, raw_name: &str) -> bool {
        self.names.contains(raw_name)
    }
}

/// Regular-expression policy: a name is traced when it matches `allow`
/// (if given) and does not match `deny` (if given).
#[derive(Clone, Debug, Default)]
pub struct RegexFilter {
    allow: Option<Regex>,
    deny: Option<Regex>,
}

impl RegexFilter {
    pub fn new(allow: Option<&str>, deny: Option<&str>) -> Result<Self> {
        Ok(Self {
            allow: allow.map(Regex::new).transpose()?,
            deny: deny.map(Regex::new).transpose()?,
        })
    }
}

impl TraceFilter for RegexFilter {
    fn should_trace(&self, raw_name: &str) -> bool {
        self.allow.as_ref().is_none_or(|re| re.is_match(raw_name))
            && !self.deny.as_ref().is_some_and(|re| re.is_match(raw_name))
    }
}

/// Traces a name only if every inner filter does.
#[derive(Default)]
pub struct AllOf {
    filters: Vec<Box<dyn TraceFilter>>,
}

impl AllOf {
    #[must_use]
    pub fn with(mut self, filter: impl TraceFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl TraceFilter for AllOf {
    fn should_trace(&self, raw_name: &str) -> bool {
        self.filters.iter().all(|f| f.should_trace(raw_name))
    }
}
