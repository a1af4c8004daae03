/// Mark a failure path as `#[cold]`, so the happy path of `allocate()` and
/// `free()` stays straight-line.
#[cold]
#[inline(never)]
pub fn cold<R, F: FnOnce() -> R>(f: F) -> R {
    f()
}
