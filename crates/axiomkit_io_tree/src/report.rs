//! Directory/file/byte counts produced by one tree walk.

use std::collections::BTreeMap;
use std::fmt;

use crate::counter::Counter;

/// Aggregate counters for one traversal.
///
/// Created once per operation and mutated only by the visitor driving it.
/// Reusing an instance across walks accumulates; call [`PathCounters::reset`]
/// for fresh totals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathCounters {
    counter_directories: Counter,
    counter_files: Counter,
    counter_bytes: Counter,
}

impl PathCounters {
    /// Fixed-width counters.
    pub fn long() -> Self {
        Self::from_counters(Counter::long(), Counter::long(), Counter::long())
    }

    /// Arbitrary-precision counters.
    pub fn big_integer() -> Self {
        Self::from_counters(
            Counter::big_integer(),
            Counter::big_integer(),
            Counter::big_integer(),
        )
    }

    /// Counters that ignore every update.
    pub fn noop() -> Self {
        Self::from_counters(Counter::noop(), Counter::noop(), Counter::noop())
    }

    /// Assemble from three counters.
    pub fn from_counters(
        counter_directories: Counter,
        counter_files: Counter,
        counter_bytes: Counter,
    ) -> Self {
        Self {
            counter_directories,
            counter_files,
            counter_bytes,
        }
    }

    /// Directories visited.
    pub fn directory_counter(&self) -> &Counter {
        &self.counter_directories
    }

    /// Files visited.
    pub fn file_counter(&self) -> &Counter {
        &self.counter_files
    }

    /// Total length of the visited files.
    pub fn byte_counter(&self) -> &Counter {
        &self.counter_bytes
    }

    /// Mutable access to the directory count.
    pub fn directory_counter_mut(&mut self) -> &mut Counter {
        &mut self.counter_directories
    }

    /// Mutable access to the file count.
    pub fn file_counter_mut(&mut self) -> &mut Counter {
        &mut self.counter_files
    }

    /// Mutable access to the byte count.
    pub fn byte_counter_mut(&mut self) -> &mut Counter {
        &mut self.counter_bytes
    }

    /// Reset all three counters to zero.
    pub fn reset(&mut self) {
        self.counter_directories.reset();
        self.counter_files.reset();
        self.counter_bytes.reset();
    }

    /// Fold `other` into `self`.
    pub fn add(&mut self, other: &PathCounters) {
        self.counter_directories
            .add_counter(&other.counter_directories);
        self.counter_files.add_counter(&other.counter_files);
        self.counter_bytes.add_counter(&other.counter_bytes);
    }

    /// Machine-readable counters; values beyond `u64` saturate.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        for (c_name, counter) in [
            ("cnt_directories", &self.counter_directories),
            ("cnt_files", &self.counter_files),
            ("cnt_bytes", &self.counter_bytes),
        ] {
            dict_counts.insert(c_name.to_string(), counter.get_long().unwrap_or(u64::MAX));
        }
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} directories={} files={} bytes={}",
            self.counter_directories, self.counter_files, self.counter_bytes
        )
    }
}

impl Default for PathCounters {
    fn default() -> Self {
        Self::long()
    }
}

impl fmt::Display for PathCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[COUNT]"))
    }
}
