/*!
 * Per-Thread Hold Registry
 *
 * Tracks which lock instances the current thread holds so that a second
 * acquisition of the same lock fails with a reentrancy error instead of
 * deadlocking against itself.
 */

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

thread_local! {
    static HELD: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique lock identity
#[inline]
pub(crate) fn next_lock_id() -> u64 {
    NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed)
}

/// Whether the calling thread currently holds `id`
#[inline]
pub(crate) fn is_held(id: u64) -> bool {
    HELD.with(|held| held.borrow().contains(&id))
}

#[inline]
pub(crate) fn mark_held(id: u64) {
    HELD.with(|held| held.borrow_mut().push(id));
}

/// Remove one hold of `id`
///
/// Uses `try_with` because guards may be dropped while thread-locals are
/// being torn down.
#[inline]
pub(crate) fn mark_released(id: u64) {
    let _ = HELD.try_with(|held| {
        let mut held = held.borrow_mut();
        if let Some(pos) = held.iter().rposition(|&h| h == id) {
            held.swap_remove(pos);
        }
    });
}
