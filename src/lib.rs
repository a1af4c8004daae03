//! A debugging allocator.
//!
//! [`DebugAlloc`] hands out memory from a fixed-size, `mmap()`ed arena by
//! bumping a cursor, and remembers every live allocation together with the
//! source location that made it. That buys you:
//!
//! - invalid and double `free()` detection (freed space is never reused, so a
//!   stale pointer can never alias a newer allocation),
//! - a hard memory ceiling,
//! - running [`Statistics`] and a leak report of whatever is still live.
//!
//! ```rust
//! use dbgmalloc::{DebugAlloc, Site};
//!
//! let mut alloc = DebugAlloc::with_capacity(1 << 12).unwrap();
//! let p = alloc.allocate(64, Site::caller()).unwrap();
//! alloc.free(p.as_ptr(), Site::caller()).unwrap();
//! assert!(alloc.free(p.as_ptr(), Site::caller()).is_err()); // double free
//! assert_eq!(alloc.statistics().active_count, 0);
//! ```
//!
//! C programs can use the process-wide instance through [`externc`].

pub mod alloc;
pub mod config;
pub mod error;
pub mod externc;
pub mod os;
pub mod util;

pub use alloc::{
    arena::{Arena, DEFAULT_CAPACITY},
    debug::DebugAlloc,
    registry::AllocRecord,
    site::Site,
    stats::{Leak, LeakReport, Statistics},
};
pub use config::{DebugAllocConfig, Diagnostics};
pub use error::{AllocError, ArenaError, ConfigError, FreeError, LeakReportFileError};
