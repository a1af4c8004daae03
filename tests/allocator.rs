use std::{
    collections::BTreeSet,
    io::{self, Write},
    sync::{Arc, Mutex},
};

use dbgmalloc::{AllocError, DebugAlloc, LeakReport, Site};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn allocator(capacity: usize) -> (DebugAlloc, Captured) {
    init_logging();
    let captured = Captured::default();
    let alloc = DebugAlloc::with_capacity(capacity)
        .unwrap()
        .with_diagnostics(captured.clone());
    (alloc, captured)
}

#[test]
fn addresses_strictly_increase_and_ranges_are_disjoint() {
    let (mut alloc, _) = allocator(1 << 16);
    let mut rng = StdRng::seed_from_u64(0x61);
    let mut prev_end = alloc.arena().base();
    for _ in 0..500 {
        let size = rng.gen_range(1..64);
        let p = alloc.allocate(size, Site::caller()).unwrap().as_ptr() as usize;
        assert_eq!(p, prev_end);
        prev_end = p + size;
        if rng.gen_bool(0.5) {
            alloc.free(p as *mut u8, Site::caller()).unwrap();
        }
    }
}

#[test]
fn capacity_boundary() {
    let (mut alloc, _) = allocator(100);
    alloc.allocate(60, Site::caller()).unwrap();

    let before = alloc.statistics();
    assert_eq!(
        alloc.allocate(41, Site::caller()),
        Err(AllocError::OutOfMemory {
            requested: 41,
            remaining: 40
        })
    );
    let after = alloc.statistics();
    assert_eq!(after.fail_count, before.fail_count + 1);
    assert_eq!(after.fail_bytes, before.fail_bytes + 41);
    assert_eq!(after.active_count, before.active_count);
    assert_eq!(after.active_bytes, before.active_bytes);
    assert_eq!(after.total_count, before.total_count);
    assert_eq!(after.total_bytes, before.total_bytes);

    alloc.allocate(40, Site::caller()).unwrap();
    assert_eq!(alloc.arena().remaining(), 0);
}

#[test]
fn random_alloc_free_sequences_keep_the_registry_consistent() {
    let (mut alloc, captured) = allocator(1 << 20);
    let mut rng = StdRng::seed_from_u64(7);
    let mut live: Vec<usize> = Vec::new();
    let mut freed: Vec<usize> = Vec::new();
    let mut returned = 0u64;
    let mut matched_frees = 0u64;
    let mut bad_frees = 0usize;

    for _ in 0..2000 {
        match rng.gen_range(0..10) {
            0..=5 => {
                let size = rng.gen_range(0..256);
                if let Ok(p) = alloc.allocate(size, Site::caller()) {
                    live.push(p.as_ptr() as usize);
                    returned += 1;
                }
            }
            6..=8 if !live.is_empty() => {
                let p = live.swap_remove(rng.gen_range(0..live.len()));
                alloc.free(p as *mut u8, Site::caller()).unwrap();
                freed.push(p);
                matched_frees += 1;
            }
            _ if !freed.is_empty() => {
                let p = freed[rng.gen_range(0..freed.len())];
                let before = alloc.statistics();
                assert!(alloc.free(p as *mut u8, Site::caller()).is_err());
                assert_eq!(alloc.statistics(), before);
                bad_frees += 1;
            }
            _ => {}
        }
        let stats = alloc.statistics();
        assert_eq!(stats.active_count, returned - matched_frees);
        assert_eq!(stats.active_count, live.len() as u64);
        assert!(stats.active_count <= stats.total_count);
        assert!(stats.active_bytes <= stats.total_bytes);
    }

    let leaked: BTreeSet<usize> = alloc.leaks().iter().map(|r| r.address).collect();
    assert_eq!(leaked, live.iter().copied().collect());
    assert_eq!(captured.lines().len(), bad_frees);
}

#[test]
fn leak_report_lists_exactly_the_unfreed() {
    let (mut alloc, captured) = allocator(1 << 10);
    let a = alloc.allocate(8, Site::new("leak.c", 1)).unwrap();
    let b = alloc.allocate(16, Site::new("leak.c", 2)).unwrap();
    let c = alloc.allocate(32, Site::new("leak.c", 3)).unwrap();
    alloc.free(b.as_ptr(), Site::new("leak.c", 4)).unwrap();

    alloc.print_leak_report();
    assert_eq!(
        captured.lines(),
        vec![
            format!("leak.c:1: allocated object {:#x} with size 8", a.as_ptr() as usize),
            format!("leak.c:3: allocated object {:#x} with size 32", c.as_ptr() as usize),
        ]
    );
}

#[test]
fn leak_report_survives_a_trip_through_a_file() {
    let (mut alloc, _) = allocator(1 << 10);
    alloc.allocate(8, Site::new("leak.c", 1)).unwrap();
    alloc.allocate(0, Site::new("leak.c", 2)).unwrap_err();
    let report = alloc.leak_report();
    assert_eq!(report.leaks.len(), 1);
    assert_eq!(report.statistics.fail_count, 1);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("leaks.json");
    report.write_to_file(&path).unwrap();
    assert_eq!(LeakReport::from_file(&path).unwrap(), report);

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["leaks"][0]["file"], "leak.c");
    assert_eq!(json["statistics"]["active_bytes"], 8);
}

#[test]
fn independent_instances_do_not_share_state() {
    let (mut first, _) = allocator(64);
    let (mut second, second_out) = allocator(64);
    let p = first.allocate(8, Site::caller()).unwrap();

    assert!(second.free(p.as_ptr(), Site::caller()).is_err());
    assert_eq!(second_out.lines().len(), 1);
    assert!(first.is_live(p.as_ptr()));
    assert_eq!(second.statistics().total_count, 0);
}
