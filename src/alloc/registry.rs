//! The set of live allocations, keyed by start address.

use hashbrown::HashMap;
use serde::Serialize;

use super::site::Site;

/// One live allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AllocRecord {
    pub address: usize,
    pub size: usize,
    pub site: Site,
}

struct Entry {
    /// Allocation order, so reports come out in the order things were
    /// allocated regardless of hash order.
    seq: u64,
    record: AllocRecord,
}

#[derive(Default)]
pub struct Registry {
    live: HashMap<usize, Entry>,
    next_seq: u64,
    bytes: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh allocation. The arena never hands out the same
    /// address twice, so `record.address` is never already present.
    pub fn insert(&mut self, record: AllocRecord) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.bytes += record.size;
        let prev = self.live.insert(record.address, Entry { seq, record });
        debug_assert!(prev.is_none(), "address {:#x} registered twice", record.address);
    }

    /// Unregister the allocation starting at `address`, if there is one.
    pub fn remove(&mut self, address: usize) -> Option<AllocRecord> {
        let Entry { record, .. } = self.live.remove(&address)?;
        self.bytes -= record.size;
        Some(record)
    }

    pub fn get(&self, address: usize) -> Option<&AllocRecord> {
        self.live.get(&address).map(|entry| &entry.record)
    }

    pub fn contains(&self, address: usize) -> bool {
        self.live.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Sum of the sizes of all live records.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// All live records, oldest allocation first. O(n log n).
    pub fn records(&self) -> Vec<AllocRecord> {
        let mut entries: Vec<&Entry> = self.live.values().collect();
        entries.sort_unstable_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.record).collect()
    }
}
