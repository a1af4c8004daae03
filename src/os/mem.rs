use std::ptr::NonNull;

use once_cell::sync::Lazy;

use crate::{error::ArenaError, util::num::checked_round_up};

static PAGE_SIZE: Lazy<usize> = Lazy::new(page_size::get);

pub fn page_size() -> usize {
    *PAGE_SIZE
}

/// A read/write, page-aligned block of committed memory, owned for as long as
/// this value lives and handed back to the OS exactly once, on drop.
pub struct MmapRegion {
    ptr: NonNull<u8>,
    /// Length of the mapping, always a multiple of the page size.
    size: usize,
}

// SAFETY: the region is plain memory owned uniquely by this value. Nothing
// about it is tied to the thread that mapped it.
unsafe impl Send for MmapRegion {}

impl MmapRegion {
    /// Map at least `size` bytes (rounded up to whole pages). Anonymous
    /// mappings come back zero-filled.
    pub fn map(size: usize) -> Result<MmapRegion, ArenaError> {
        if size == 0 {
            return Err(ArenaError::ZeroCapacity);
        }
        let size = checked_round_up(size, page_size()).ok_or(ArenaError::TooLarge(size))?;
        let ptr = sys::map(size).map_err(|source| ArenaError::Map { size, source })?;
        log::debug!(target: "dbgmalloc", "mapped {size} bytes at {:#x}", ptr.as_ptr() as usize);
        Ok(MmapRegion { ptr, size })
    }

    pub const fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub const fn len(&self) -> usize {
        self.size
    }
}

impl Drop for MmapRegion {
    fn drop(&mut self) {
        log::debug!(
            target: "dbgmalloc",
            "unmapping {} bytes at {:#x}",
            self.size,
            self.ptr.as_ptr() as usize
        );
        // SAFETY: `ptr` and `size` are exactly what `sys::map()` returned, and
        // `drop()` runs once.
        unsafe { sys::unmap(self.ptr, self.size) }
    }
}

#[cfg(unix)]
mod sys {
    use std::{io, ptr::{self, NonNull}};

    use libc::{mmap, munmap, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};

    pub(super) fn map(size: usize) -> io::Result<NonNull<u8>> {
        // SAFETY: a fresh anonymous private mapping does not alias anything.
        let ptr = unsafe {
            mmap(
                ptr::null_mut(),
                size,
                PROT_READ | PROT_WRITE,
                MAP_ANONYMOUS | MAP_PRIVATE,
                -1,
                0,
            )
        };
        if ptr == MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(ptr as *mut u8).ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))
    }

    /// # Safety
    ///
    /// `ptr`/`size` must be a live mapping returned by [`map()`].
    pub(super) unsafe fn unmap(ptr: NonNull<u8>, size: usize) {
        // SAFETY:
        // - The address must be a multiple of the page size. It is, since we
        //   only ever unmap what mmap() handed us.
        // - All pages of the range are unmapped, which is fine because the
        //   whole range is ours.
        unsafe {
            munmap(ptr.as_ptr() as _, size);
        }
    }
}

#[cfg(not(unix))]
mod sys {
    use std::{
        alloc::{alloc_zeroed, dealloc, Layout},
        io,
        ptr::NonNull,
    };

    fn layout(size: usize) -> io::Result<Layout> {
        Layout::from_size_align(size, super::page_size())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }

    pub(super) fn map(size: usize) -> io::Result<NonNull<u8>> {
        let layout = layout(size)?;
        // SAFETY: `size` is non-zero (checked by the caller).
        let ptr = unsafe { alloc_zeroed(layout) };
        NonNull::new(ptr).ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))
    }

    /// # Safety
    ///
    /// `ptr`/`size` must be a live block returned by [`map()`].
    pub(super) unsafe fn unmap(ptr: NonNull<u8>, size: usize) {
        if let Ok(layout) = layout(size) {
            // SAFETY: same layout as the matching `alloc_zeroed()`.
            unsafe { dealloc(ptr.as_ptr(), layout) }
        }
    }
}
