use std::{
    fmt,
    fs::File,
    io::{Read, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use super::registry::AllocRecord;
use crate::error::LeakReportFileError;

/// Running counters of a `DebugAlloc`. This is a plain copy: reading it never
/// changes the allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// Number of live allocations.
    pub active_count: u64,
    /// Bytes in live allocations.
    pub active_bytes: u64,
    /// Number of successful allocations, ever.
    pub total_count: u64,
    /// Bytes in successful allocations, ever.
    pub total_bytes: u64,
    /// Number of refused allocation requests.
    pub fail_count: u64,
    /// Bytes requested by refused allocations. Wraps on overflow.
    pub fail_bytes: u64,
    /// Smallest address ever handed out. `0` until the first allocation.
    pub heap_min: usize,
    /// Largest address ever handed out (last byte of an allocation).
    pub heap_max: usize,
}

impl Statistics {
    pub(crate) fn record_success(&mut self, address: usize, size: usize) {
        debug_assert!(size > 0);
        self.total_count += 1;
        self.total_bytes += size as u64;
        self.active_count += 1;
        self.active_bytes += size as u64;
        if self.heap_min == 0 || address < self.heap_min {
            self.heap_min = address;
        }
        let last = address + (size - 1);
        if last > self.heap_max {
            self.heap_max = last;
        }
    }

    pub(crate) fn record_failure(&mut self, requested: usize) {
        self.fail_count += 1;
        self.fail_bytes = self.fail_bytes.wrapping_add(requested as u64);
    }

    pub(crate) fn record_free(&mut self, size: usize) {
        debug_assert!(self.active_count > 0);
        self.active_count -= 1;
        self.active_bytes -= size as u64;
    }
}

/// The two-line report `print_statistics()` writes. External tooling parses
/// this, so keep it stable.
impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "alloc count: active {:>10}   total {:>10}   fail {:>10}",
            self.active_count, self.total_count, self.fail_count
        )?;
        write!(
            f,
            "alloc size:  active {:>10}   total {:>10}   fail {:>10}",
            self.active_bytes, self.total_bytes, self.fail_bytes
        )
    }
}

/// One line of a leak report, with an owned file name so it can be loaded back
/// from disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leak {
    pub file: Option<String>,
    pub line: u32,
    pub address: usize,
    pub size: usize,
}

impl From<&AllocRecord> for Leak {
    fn from(record: &AllocRecord) -> Self {
        Self {
            file: record.site.file.map(str::to_owned),
            line: record.site.line,
            address: record.address,
            size: record.size,
        }
    }
}

impl fmt::Display for Leak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: allocated object {:#x} with size {}",
            self.file.as_deref().unwrap_or(super::site::UNKNOWN_FILE),
            self.line,
            self.address,
            self.size
        )
    }
}

/// Machine-readable snapshot of an allocator: its statistics and everything
/// still live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakReport {
    pub statistics: Statistics,
    pub leaks: Vec<Leak>,
}

impl LeakReport {
    pub fn new(statistics: Statistics, records: &[AllocRecord]) -> Self {
        Self {
            statistics,
            leaks: records.iter().map(Leak::from).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to_file<P>(&self, path: P) -> Result<(), LeakReportFileError>
    where
        P: AsRef<Path>,
    {
        let mut file = File::create(path)?;
        file.write_all(&serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn from_file<P>(path: P) -> Result<Self, LeakReportFileError>
    where
        P: AsRef<Path>,
    {
        let mut buf = String::new();
        File::open(path)?.read_to_string(&mut buf)?;
        Ok(serde_json::from_str(&buf)?)
    }
}
