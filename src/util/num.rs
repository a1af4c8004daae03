/// Round up `n` to the nearest multiple of `to`, or `None` if that multiple
/// does not fit in a `usize`.
pub fn checked_round_up(n: usize, to: usize) -> Option<usize> {
    debug_assert!(to != 0);
    n.checked_add(to - 1).map(|n| n / to * to)
}

/// `count * size`, or `None` if the product is not representable. This is the
/// same division test a C `calloc()` does: `size > usize::MAX / count`.
pub fn array_size(count: usize, size: usize) -> Option<usize> {
    if count != 0 && size > usize::MAX / count {
        None
    } else {
        Some(count * size)
    }
}
