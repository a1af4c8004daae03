//! Drives the process-wide allocator the way an instrumented C program would,
//! then prints the statistics and leak report.
//!
//! ```sh
//! RUST_LOG=dbgmalloc=trace DBGMALLOC_CAPACITY=64k cargo run --example leak_check
//! ```

use std::ptr;

use dbgmalloc::externc::{
    dbg_calloc, dbg_free, dbg_get_statistics, dbg_malloc, dbg_print_leak_report,
    dbg_print_statistics,
};

fn main() {
    env_logger::init();
    let file = c"leak_check.c".as_ptr();

    unsafe {
        let kept = dbg_malloc(100, file, 10);
        let dropped = dbg_malloc(50, file, 11);
        let zeroed = dbg_calloc(8, 4, file, 12);
        dbg_free(dropped, file, 13);
        dbg_free(dropped, file, 14); // double free
        dbg_free(ptr::null_mut(), file, 15);
        let refused = dbg_calloc(usize::MAX, 8, file, 16);
        assert!(refused.is_null());
        assert!(!kept.is_null() && !zeroed.is_null());
    }

    dbg_print_statistics();
    dbg_print_leak_report();
    let stats = dbg_get_statistics();
    println!("heap span {:#x}..={:#x}", stats.heap_min, stats.heap_max);
}
