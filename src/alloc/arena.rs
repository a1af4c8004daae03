use std::ptr::NonNull;

use crate::{error::ArenaError, os::mem::MmapRegion};

/// 8 MiB
pub const DEFAULT_CAPACITY: usize = 8 << 20;

/// A bump allocator over a single [`MmapRegion`]. `reserve()` is just a cursor
/// bump, and nothing is ever handed back: the whole region goes back to the OS
/// when the arena is dropped.
pub struct Arena {
    region: MmapRegion,
    /// Reservable bytes. May be less than `region.len()`, which is page
    /// rounded.
    capacity: usize,
    /// Offset of the next free byte. Never decreases.
    cursor: usize,
}

impl Arena {
    /// Construct a new [`Arena`] that can hand out up to `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self, ArenaError> {
        Ok(Self {
            region: MmapRegion::map(capacity)?,
            capacity,
            cursor: 0,
        })
    }

    /// The next `size` bytes, or `None` if fewer than `size` remain. No
    /// alignment is applied.
    pub fn reserve(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size > self.remaining() {
            return None;
        }
        // SAFETY: `cursor + size <= capacity <= region.len()`, so the result
        // is inside the mapping (or one past the end when `size == 0`).
        let data = unsafe { self.region.as_ptr().add(self.cursor) };
        self.cursor += size;
        NonNull::new(data)
    }

    pub fn base(&self) -> usize {
        self.region.as_ptr() as usize
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub const fn used(&self) -> usize {
        self.cursor
    }

    pub const fn remaining(&self) -> usize {
        self.capacity - self.cursor
    }

    /// Is `address` inside the reservable part of this arena?
    pub fn contains(&self, address: usize) -> bool {
        (self.base()..self.base() + self.capacity).contains(&address)
    }
}
