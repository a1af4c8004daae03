//! A process-wide [`DebugAlloc`] behind one mutex, and `extern "C"` entry
//! points over it, so C code can route `malloc`/`free`/`calloc` here with a
//! `#define` that passes `__FILE__` and `__LINE__`.
//!
//! The instance is built on first use from [`DebugAllocConfig::from_env()`]
//! and lives until the process exits. Failing to map its arena is fatal.

use std::{
    ffi::{c_char, c_int, c_void, CStr},
    ptr,
    sync::{Mutex, PoisonError},
};

use libc::{c_ulonglong, size_t, uintptr_t};
use once_cell::sync::Lazy;

use crate::{
    alloc::{debug::DebugAlloc, site::Site, stats::Statistics},
    config::DebugAllocConfig,
};

static GLOBAL: Lazy<Mutex<DebugAlloc>> = Lazy::new(|| {
    let config = DebugAllocConfig::from_env().unwrap_or_else(|err| {
        log::warn!(target: "dbgmalloc", "{err}, falling back to the default configuration");
        DebugAllocConfig::default()
    });
    match DebugAlloc::new(&config) {
        Ok(alloc) => Mutex::new(alloc),
        Err(err) => panic!("dbgmalloc: cannot set up the allocator arena: {err}"),
    }
});

/// Run `f` with exclusive access to the process-wide allocator.
pub fn with_global<R, F>(f: F) -> R
where
    F: FnOnce(&mut DebugAlloc) -> R,
{
    // Nothing in `DebugAlloc` is left half-updated by a panic in `f` that the
    // next caller could trip over, so a poisoned lock is still usable.
    let mut alloc = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut alloc)
}

/// # Safety
///
/// `file` must be null or a NUL-terminated string that lives for the rest of
/// the process, like a `__FILE__` literal.
unsafe fn site(file: *const c_char, line: c_int) -> Site {
    let line = u32::try_from(line).unwrap_or(0);
    if file.is_null() {
        return Site::unknown(line);
    }
    // SAFETY: requirement passed to caller
    match unsafe { CStr::from_ptr(file) }.to_str() {
        Ok(file) => Site::new(file, line),
        Err(_) => Site::unknown(line),
    }
}

/// C view of [`Statistics`].
#[allow(non_camel_case_types)]
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct dbg_statistics {
    pub nactive: c_ulonglong,
    pub active_size: c_ulonglong,
    pub ntotal: c_ulonglong,
    pub total_size: c_ulonglong,
    pub nfail: c_ulonglong,
    pub fail_size: c_ulonglong,
    pub heap_min: uintptr_t,
    pub heap_max: uintptr_t,
}

impl From<Statistics> for dbg_statistics {
    fn from(stats: Statistics) -> Self {
        Self {
            nactive: stats.active_count,
            active_size: stats.active_bytes,
            ntotal: stats.total_count,
            total_size: stats.total_bytes,
            nfail: stats.fail_count,
            fail_size: stats.fail_bytes,
            heap_min: stats.heap_min,
            heap_max: stats.heap_max,
        }
    }
}

/// `malloc(size)` made at `file:line`. Returns null on failure.
///
/// # Safety
///
/// `file` must be null or a NUL-terminated string that outlives the process.
#[no_mangle]
pub unsafe extern "C" fn dbg_malloc(size: size_t, file: *const c_char, line: c_int) -> *mut c_void {
    // SAFETY: same contract as ours
    let site = unsafe { site(file, line) };
    with_global(|alloc| alloc.allocate(size, site))
        .map_or(ptr::null_mut(), |data| data.as_ptr() as _)
}

/// `free(ptr)` made at `file:line`. Null is ignored; anything that is not a
/// live allocation is reported and otherwise ignored.
///
/// # Safety
///
/// `file` must be null or a NUL-terminated string that outlives the process.
/// `ptr` is never dereferenced.
#[no_mangle]
pub unsafe extern "C" fn dbg_free(ptr: *mut c_void, file: *const c_char, line: c_int) {
    // SAFETY: same contract as ours
    let site = unsafe { site(file, line) };
    // Already reported on the diagnostics sink.
    let _ = with_global(|alloc| alloc.free(ptr as *mut u8, site));
}

/// `calloc(count, size)` made at `file:line`. Returns null on failure,
/// including when `count * size` overflows.
///
/// # Safety
///
/// `file` must be null or a NUL-terminated string that outlives the process.
#[no_mangle]
pub unsafe extern "C" fn dbg_calloc(
    count: size_t,
    size: size_t,
    file: *const c_char,
    line: c_int,
) -> *mut c_void {
    // SAFETY: same contract as ours
    let site = unsafe { site(file, line) };
    with_global(|alloc| alloc.zero_allocate(count, size, site))
        .map_or(ptr::null_mut(), |data| data.as_ptr() as _)
}

#[no_mangle]
pub extern "C" fn dbg_get_statistics() -> dbg_statistics {
    with_global(|alloc| alloc.statistics()).into()
}

#[no_mangle]
pub extern "C" fn dbg_print_statistics() {
    with_global(DebugAlloc::print_statistics)
}

#[no_mangle]
pub extern "C" fn dbg_print_leak_report() {
    with_global(DebugAlloc::print_leak_report)
}
