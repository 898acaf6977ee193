/*!
 * Scoped Lock
 *
 * Exclusive lock with bounded wait and guard-based release.
 *
 * # Fairness
 *
 * Built on `parking_lot::Mutex`, which is eventually fair: a contended
 * unlock periodically hands the lock directly to the next parked thread,
 * so no acquirer starves under uniform contention. There is no strict FIFO
 * promise.
 *
 * # Lock ordering
 *
 * Two independent locks have no relative ordering. Acquiring them in
 * inconsistent orders from different call sites can deadlock; bounded
 * timeouts turn that into a `Timeout` error but do not prevent it. Ordering
 * is the caller's responsibility.
 */

use super::holds;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::guard::{Guard, GuardMetadata, TimeoutContext, TimeoutPolicy};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tracing::{debug, trace};

/// Non-reentrant mutual exclusion around a value
///
/// # Example
///
/// ```
/// use sync_toolkit::core::sync::ScopedLock;
/// use std::time::Duration;
///
/// let counter = ScopedLock::new(0);
/// *counter.acquire(Duration::from_millis(50))? += 1;
/// assert_eq!(*counter.acquire(Duration::from_millis(50))?, 1);
/// # Ok::<(), sync_toolkit::SyncError>(())
/// ```
pub struct ScopedLock<T> {
    id: u64,
    name: &'static str,
    inner: Mutex<T>,
}

impl<T> ScopedLock<T> {
    pub fn new(value: T) -> Self {
        Self::named("scoped_lock", value)
    }

    /// Create a lock whose name shows up in errors and traces
    pub fn named(name: &'static str, value: T) -> Self {
        Self {
            id: holds::next_lock_id(),
            name,
            inner: Mutex::new(value),
        }
    }

    /// Acquire within `timeout`
    ///
    /// # Errors
    ///
    /// - `Timeout` if the lock was not obtained in time; nothing changed.
    /// - `Reentrancy` if the calling thread already holds this lock.
    pub fn acquire(&self, timeout: Duration) -> SyncResult<ScopedLockGuard<'_, T>> {
        self.acquire_with(TimeoutPolicy::Lock(timeout))
    }

    /// Acquire under an explicit policy; `TimeoutPolicy::None` waits forever
    pub fn acquire_with(&self, policy: TimeoutPolicy) -> SyncResult<ScopedLockGuard<'_, T>> {
        self.check_reentrancy()?;

        let ctx = TimeoutContext::new(policy, self.name);
        let guard = match ctx.remaining() {
            None => Some(self.inner.lock()),
            Some(remaining) => self.inner.try_lock_for(remaining),
        };

        match guard {
            Some(guard) => Ok(self.wrap(guard)),
            None => {
                debug!(
                    resource = self.name,
                    lock_id = self.id,
                    elapsed_ms = ctx.elapsed().as_millis() as u64,
                    "lock acquisition timed out"
                );
                Err(ctx.timeout_error())
            }
        }
    }

    /// Acquire only if the lock is free right now
    ///
    /// Returns `Ok(None)` when another thread holds it.
    pub fn try_acquire(&self) -> SyncResult<Option<ScopedLockGuard<'_, T>>> {
        self.check_reentrancy()?;
        Ok(self.inner.try_lock().map(|guard| self.wrap(guard)))
    }

    /// Whether any thread currently holds the lock (diagnostic only)
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Mutable access without locking; the borrow proves exclusivity
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    fn check_reentrancy(&self) -> SyncResult<()> {
        if holds::is_held(self.id) {
            debug!(resource = self.name, lock_id = self.id, "re-entrant lock acquisition rejected");
            return Err(SyncError::reentrancy(self.name));
        }
        Ok(())
    }

    fn wrap<'a>(&'a self, guard: MutexGuard<'a, T>) -> ScopedLockGuard<'a, T> {
        holds::mark_held(self.id);
        ScopedLockGuard {
            guard,
            metadata: GuardMetadata::new(self.name).with_resource_id(self.id),
        }
    }
}

impl<T: Default> Default for ScopedLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for ScopedLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedLock")
            .field("name", &self.name)
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// Exclusive hold on a [`ScopedLock`]; releases on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopedLockGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    metadata: GuardMetadata,
}

impl<T> Deref for ScopedLockGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for ScopedLockGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Guard for ScopedLockGuard<'_, T> {
    fn resource_type(&self) -> &'static str {
        self.metadata.resource_type
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }
}

impl<T> Drop for ScopedLockGuard<'_, T> {
    fn drop(&mut self) {
        // The mutex itself unlocks when `guard` drops right after this
        holds::mark_released(self.metadata.resource_id);
        trace!(
            resource = self.metadata.resource_type,
            held_us = self.metadata.lifetime_micros(),
            "lock released"
        );
    }
}
