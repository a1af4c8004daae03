//! The debugging allocator itself.
//!
//! ```plaintext
//!  allocate(n) ──► Arena::reserve(n) ──► Registry::insert ──► Statistics
//!  free(p)     ──► Registry::remove ──┬─► Statistics
//!                                     └─► "Invalid free or double free ..."
//! ```
//!
//! Space is never reused: a freed allocation only leaves the registry, its
//! bytes stay reserved in the arena until the whole arena is dropped. That is
//! what lets a stale pointer always be recognised as a double free.

use std::{
    fmt,
    io::{self, Write},
    ptr::NonNull,
};

use super::{
    arena::Arena,
    registry::{AllocRecord, Registry},
    site::Site,
    stats::{Leak, LeakReport, Statistics},
};
use crate::{
    config::{DebugAllocConfig, Diagnostics},
    error::{AllocError, ArenaError, FreeError},
    util::{hint::cold, num::array_size},
};

/// An allocation-tracking allocator context. Owns its arena, its registry of
/// live allocations and its statistics; independent instances share nothing.
///
/// All operations take `&mut self`. Put it behind one lock if more than one
/// thread needs it (the process-wide instance in [`crate::externc`] does).
pub struct DebugAlloc {
    arena: Arena,
    registry: Registry,
    stats: Statistics,
    /// Where reports and invalid-free diagnostics are written.
    diagnostics: Box<dyn Write + Send>,
}

impl fmt::Debug for DebugAlloc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugAlloc")
            .field("base", &format_args!("{:#x}", self.arena.base()))
            .field("capacity", &self.arena.capacity())
            .field("used", &self.arena.used())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl DebugAlloc {
    pub fn new(config: &DebugAllocConfig) -> Result<Self, ArenaError> {
        let diagnostics: Box<dyn Write + Send> = match config.diagnostics {
            Diagnostics::Stderr => Box::new(io::stderr()),
            Diagnostics::Stdout => Box::new(io::stdout()),
        };
        Ok(Self {
            arena: Arena::new(config.capacity)?,
            registry: Registry::new(),
            stats: Statistics::default(),
            diagnostics,
        })
    }

    /// Default configuration with an arena of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self, ArenaError> {
        Self::new(&DebugAllocConfig::default().with_capacity(capacity))
    }

    /// Send reports and diagnostics to `sink` instead of the configured
    /// stream.
    pub fn with_diagnostics<W>(mut self, sink: W) -> Self
    where
        W: Write + Send + 'static,
    {
        self.diagnostics = Box::new(sink);
        self
    }

    /// Allocate `size` uninitialised bytes for `site`.
    ///
    /// Zero-size requests fail, like requests that do not fit in what is left
    /// of the arena. Every failure is counted in `fail_count`/`fail_bytes`.
    pub fn allocate(&mut self, size: usize, site: Site) -> Result<NonNull<u8>, AllocError> {
        if size == 0 {
            return cold(|| self.refuse(0, AllocError::ZeroSize, site));
        }
        let Some(data) = self.arena.reserve(size) else {
            let remaining = self.arena.remaining();
            return cold(|| {
                self.refuse(
                    size,
                    AllocError::OutOfMemory {
                        requested: size,
                        remaining,
                    },
                    site,
                )
            });
        };
        let address = data.as_ptr() as usize;
        self.registry.insert(AllocRecord {
            address,
            size,
            site,
        });
        self.stats.record_success(address, size);
        log::trace!(target: "dbgmalloc", "{site}: allocate({size}) = {address:#x}");
        Ok(data)
    }

    /// Allocate room for `count` elements of `size` bytes each, zero-filled.
    ///
    /// If `count * size` overflows the request fails without touching the
    /// arena. `fail_bytes` then grows by the wrapped product.
    pub fn zero_allocate(
        &mut self,
        count: usize,
        size: usize,
        site: Site,
    ) -> Result<NonNull<u8>, AllocError> {
        let Some(total) = array_size(count, size) else {
            return cold(|| {
                self.refuse(
                    count.wrapping_mul(size),
                    AllocError::SizeOverflow { count, size },
                    site,
                )
            });
        };
        let data = self.allocate(total, site)?;
        // SAFETY: `allocate()` just reserved `total` bytes at `data`, all ours.
        unsafe { data.as_ptr().write_bytes(0, total) };
        Ok(data)
    }

    fn refuse(
        &mut self,
        requested: usize,
        err: AllocError,
        site: Site,
    ) -> Result<NonNull<u8>, AllocError> {
        self.stats.record_failure(requested);
        log::debug!(target: "dbgmalloc", "{site}: {err}");
        Err(err)
    }

    /// Free the allocation that starts at `ptr`. A null `ptr` is a no-op.
    ///
    /// Anything else that is not the start of a live allocation (never
    /// allocated, already freed, or pointing into the middle of an
    /// allocation) is reported on the diagnostics sink and returned as an
    /// error. Statistics are not touched in that case.
    pub fn free(&mut self, ptr: *mut u8, site: Site) -> Result<(), FreeError> {
        if ptr.is_null() {
            return Ok(());
        }
        let address = ptr as usize;
        match self.registry.remove(address) {
            Some(record) => {
                self.stats.record_free(record.size);
                log::trace!(
                    target: "dbgmalloc",
                    "{site}: free({address:#x}) of {} bytes from {}",
                    record.size,
                    record.site
                );
                Ok(())
            }
            None => cold(|| {
                let err = FreeError::InvalidFree { address, site };
                log::warn!(target: "dbgmalloc", "{err}");
                // Best effort, the sink may be closed.
                let _ = writeln!(
                    self.diagnostics,
                    "Invalid free or double free at {site} for pointer {address:#x}"
                );
                let _ = self.diagnostics.flush();
                Err(err)
            }),
        }
    }

    /// Is `ptr` the start of a live allocation?
    pub fn is_live(&self, ptr: *const u8) -> bool {
        self.registry.contains(ptr as usize)
    }

    /// The live allocation starting at `ptr`, if any.
    pub fn record(&self, ptr: *const u8) -> Option<AllocRecord> {
        self.registry.get(ptr as usize).copied()
    }

    pub fn statistics(&self) -> Statistics {
        debug_assert_eq!(self.stats.active_count, self.registry.len() as u64);
        debug_assert_eq!(self.stats.active_bytes, self.registry.bytes() as u64);
        self.stats
    }

    /// Live allocations, oldest first.
    pub fn leaks(&self) -> Vec<AllocRecord> {
        self.registry.records()
    }

    pub fn leak_report(&self) -> LeakReport {
        LeakReport::new(self.statistics(), &self.leaks())
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn write_statistics<W>(&self, out: &mut W) -> io::Result<()>
    where
        W: Write + ?Sized,
    {
        writeln!(out, "{}", self.statistics())
    }

    /// One line per live allocation, oldest first.
    pub fn write_leak_report<W>(&self, out: &mut W) -> io::Result<()>
    where
        W: Write + ?Sized,
    {
        for record in self.registry.records() {
            writeln!(out, "{}", Leak::from(&record))?;
        }
        Ok(())
    }

    /// Write the two statistics lines to the diagnostics sink.
    pub fn print_statistics(&mut self) {
        let stats = self.statistics();
        let _ = writeln!(self.diagnostics, "{stats}");
        let _ = self.diagnostics.flush();
    }

    /// Write every live allocation to the diagnostics sink. Whatever is still
    /// live when this runs at shutdown has leaked.
    pub fn print_leak_report(&mut self) {
        let mut buf = Vec::new();
        // Writing into a `Vec` cannot fail.
        let _ = self.write_leak_report(&mut buf);
        let _ = self.diagnostics.write_all(&buf);
        let _ = self.diagnostics.flush();
    }
}
