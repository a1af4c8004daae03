use std::io;

use thiserror::Error;

use crate::alloc::site::Site;

/// Why an `allocate()` or `zero_allocate()` request was refused. Every one of
/// these is tallied in the fail statistics; none of them is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("zero-size allocation request")]
    ZeroSize,
    #[error("out of memory: requested {requested} bytes, {remaining} remaining in arena")]
    OutOfMemory { requested: usize, remaining: usize },
    #[error("array size overflow: {count} elements of {size} bytes")]
    SizeOverflow { count: usize, size: usize },
}

/// A `free()` of an address that is not a live allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FreeError {
    #[error("invalid free or double free at {site} for pointer {address:#x}")]
    InvalidFree { address: usize, site: Site },
}

/// The arena could not get its backing memory from the OS.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("arena capacity must be non-zero")]
    ZeroCapacity,
    #[error("arena capacity {0} overflows when rounded to the page size")]
    TooLarge(usize),
    #[error("could not map {size} bytes for the arena")]
    Map {
        size: usize,
        #[source]
        source: io::Error,
    },
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid arena capacity {value:?} in {var}")]
    InvalidCapacity { var: &'static str, value: String },
    #[error("unknown diagnostics target {value:?} in {var} (expected `stderr` or `stdout`)")]
    InvalidDiagnostics { var: &'static str, value: String },
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LeakReportFileError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
