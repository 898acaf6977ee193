/*!
 * Scoped Reader/Writer Lock
 *
 * Shared/exclusive lock with bounded waits and guard-based release.
 *
 * # Starvation policy: writers preferred
 *
 * Built on `parking_lot::RwLock`, which is task-fair. Once a writer is
 * waiting, newly arriving readers queue behind it instead of joining the
 * readers already inside. A steady stream of readers therefore cannot
 * starve a writer.
 *
 * | Scenario                  | Behavior                                   |
 * |---------------------------|--------------------------------------------|
 * | No writer waiting         | Readers enter immediately                  |
 * | Writer waiting            | New readers wait until the writer is done  |
 * | Readers inside + writer   | Writer waits for the readers to leave      |
 *
 * # Reentrancy
 *
 * Any acquisition on a lock the calling thread already holds (read or
 * write) is rejected with `Reentrancy`. A recursive read would otherwise
 * deadlock as soon as a writer queued between the two reads.
 */

use super::holds;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::guard::{Guard, GuardMetadata, TimeoutContext, TimeoutPolicy};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// Reader/writer lock around a value
///
/// # Example
///
/// ```
/// use sync_toolkit::core::sync::ScopedRwLock;
/// use std::time::Duration;
///
/// let balance = ScopedRwLock::new(100_i64);
/// {
///     let a = balance.acquire_read(Duration::from_millis(50))?;
///     assert_eq!(*a, 100);
/// }
/// *balance.acquire_write(Duration::from_millis(50))? += 5;
/// # Ok::<(), sync_toolkit::SyncError>(())
/// ```
pub struct ScopedRwLock<T> {
    id: u64,
    name: &'static str,
    readers: AtomicUsize,
    inner: RwLock<T>,
}

impl<T> ScopedRwLock<T> {
    pub fn new(value: T) -> Self {
        Self::named("scoped_rwlock", value)
    }

    pub fn named(name: &'static str, value: T) -> Self {
        Self {
            id: holds::next_lock_id(),
            name,
            readers: AtomicUsize::new(0),
            inner: RwLock::new(value),
        }
    }

    /// Acquire shared access within `timeout`
    pub fn acquire_read(&self, timeout: Duration) -> SyncResult<ReadGuard<'_, T>> {
        self.acquire_read_with(TimeoutPolicy::Lock(timeout))
    }

    /// Acquire exclusive access within `timeout`
    pub fn acquire_write(&self, timeout: Duration) -> SyncResult<WriteGuard<'_, T>> {
        self.acquire_write_with(TimeoutPolicy::Lock(timeout))
    }

    pub fn acquire_read_with(&self, policy: TimeoutPolicy) -> SyncResult<ReadGuard<'_, T>> {
        self.check_reentrancy("read")?;

        let ctx = TimeoutContext::new(policy, self.name);
        let guard = match ctx.remaining() {
            None => Some(self.inner.read()),
            Some(remaining) => self.inner.try_read_for(remaining),
        };

        match guard {
            Some(guard) => Ok(self.wrap_read(guard)),
            None => Err(self.timed_out(&ctx, "read")),
        }
    }

    pub fn acquire_write_with(&self, policy: TimeoutPolicy) -> SyncResult<WriteGuard<'_, T>> {
        self.check_reentrancy("write")?;

        let ctx = TimeoutContext::new(policy, self.name);
        let guard = match ctx.remaining() {
            None => Some(self.inner.write()),
            Some(remaining) => self.inner.try_write_for(remaining),
        };

        match guard {
            Some(guard) => Ok(self.wrap_write(guard)),
            None => Err(self.timed_out(&ctx, "write")),
        }
    }

    /// Shared access only if available right now
    pub fn try_read(&self) -> SyncResult<Option<ReadGuard<'_, T>>> {
        self.check_reentrancy("read")?;
        Ok(self.inner.try_read().map(|guard| self.wrap_read(guard)))
    }

    /// Exclusive access only if available right now
    pub fn try_write(&self) -> SyncResult<Option<WriteGuard<'_, T>>> {
        self.check_reentrancy("write")?;
        Ok(self.inner.try_write().map(|guard| self.wrap_write(guard)))
    }

    /// Number of live read guards (diagnostic only)
    pub fn reader_count(&self) -> usize {
        self.readers.load(Ordering::Acquire)
    }

    /// Whether a writer currently holds the lock (diagnostic only)
    pub fn is_write_locked(&self) -> bool {
        self.inner.is_locked_exclusive()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    fn check_reentrancy(&self, mode: &'static str) -> SyncResult<()> {
        if holds::is_held(self.id) {
            debug!(resource = self.name, lock_id = self.id, mode, "re-entrant rwlock acquisition rejected");
            return Err(SyncError::reentrancy(self.name));
        }
        Ok(())
    }

    fn timed_out(&self, ctx: &TimeoutContext, mode: &'static str) -> SyncError {
        debug!(
            resource = self.name,
            lock_id = self.id,
            mode,
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "rwlock acquisition timed out"
        );
        ctx.timeout_error()
    }

    fn wrap_read<'a>(&'a self, guard: RwLockReadGuard<'a, T>) -> ReadGuard<'a, T> {
        holds::mark_held(self.id);
        self.readers.fetch_add(1, Ordering::AcqRel);
        ReadGuard {
            guard,
            readers: &self.readers,
            metadata: GuardMetadata::new(self.name).with_resource_id(self.id),
        }
    }

    fn wrap_write<'a>(&'a self, guard: RwLockWriteGuard<'a, T>) -> WriteGuard<'a, T> {
        holds::mark_held(self.id);
        WriteGuard {
            guard,
            metadata: GuardMetadata::new(self.name).with_resource_id(self.id),
        }
    }
}

impl<T: Default> Default for ScopedRwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for ScopedRwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedRwLock")
            .field("name", &self.name)
            .field("readers", &self.reader_count())
            .field("write_locked", &self.is_write_locked())
            .finish_non_exhaustive()
    }
}

/// Shared hold on a [`ScopedRwLock`]; releases the read hold on drop
#[must_use = "the read lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, T>,
    readers: &'a AtomicUsize,
    metadata: GuardMetadata,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> Guard for ReadGuard<'_, T> {
    fn resource_type(&self) -> &'static str {
        self.metadata.resource_type
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.readers.fetch_sub(1, Ordering::AcqRel);
        holds::mark_released(self.metadata.resource_id);
        trace!(
            resource = self.metadata.resource_type,
            held_us = self.metadata.lifetime_micros(),
            "read lock released"
        );
    }
}

/// Exclusive hold on a [`ScopedRwLock`]; releases the write hold on drop
#[must_use = "the write lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct WriteGuard<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
    metadata: GuardMetadata,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Guard for WriteGuard<'_, T> {
    fn resource_type(&self) -> &'static str {
        self.metadata.resource_type
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        holds::mark_released(self.metadata.resource_id);
        trace!(
            resource = self.metadata.resource_type,
            held_us = self.metadata.lifetime_micros(),
            "write lock released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    const WAIT: Duration = Duration::from_millis(50);

    #[test]
    fn test_concurrent_readers() {
        let lock = Arc::new(ScopedRwLock::new(7));
        let _local = lock.acquire_read(WAIT).unwrap();

        let other = lock.clone();
        let value = thread::spawn(move || *other.acquire_read(WAIT).unwrap())
            .join()
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(lock.reader_count(), 1);
    }

    #[test]
    fn test_write_blocked_by_reader() {
        let lock = Arc::new(ScopedRwLock::new(0));
        let read = lock.acquire_read(WAIT).unwrap();

        let other = lock.clone();
        let result = thread::spawn(move || other.acquire_write(WAIT).map(|_| ()))
            .join()
            .unwrap();

        assert!(matches!(result, Err(SyncError::Timeout { .. })));
        drop(read);
        assert!(lock.acquire_write(WAIT).is_ok());
    }

    #[test]
    fn test_read_blocked_by_writer() {
        let lock = Arc::new(ScopedRwLock::new(0));
        let (tx, rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let writer_lock = lock.clone();
        let writer = thread::spawn(move || {
            let mut guard = writer_lock.acquire_write(WAIT).unwrap();
            *guard = 42;
            tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });

        rx.recv().unwrap();
        assert!(lock.is_write_locked());
        assert!(matches!(lock.acquire_read(WAIT), Err(SyncError::Timeout { .. })));

        release_tx.send(()).unwrap();
        writer.join().unwrap();
        assert_eq!(*lock.acquire_read(WAIT).unwrap(), 42);
    }

    #[test]
    fn test_reentrancy_rejected_for_both_modes() {
        let lock = ScopedRwLock::named("card", ());

        let read = lock.acquire_read(WAIT).unwrap();
        assert!(matches!(lock.acquire_read(WAIT), Err(SyncError::Reentrancy { .. })));
        assert!(matches!(lock.acquire_write(WAIT), Err(SyncError::Reentrancy { .. })));
        drop(read);

        let write = lock.acquire_write(WAIT).unwrap();
        assert!(matches!(lock.try_read(), Err(SyncError::Reentrancy { .. })));
        drop(write);

        assert!(lock.try_write().unwrap().is_some());
    }

    #[test]
    fn test_reader_count_tracks_guards() {
        let lock = Arc::new(ScopedRwLock::new(()));
        let (tx, rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let done_rx = Arc::new(parking_lot::Mutex::new(done_rx));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let lock = lock.clone();
                let tx = tx.clone();
                let done_rx = done_rx.clone();
                thread::spawn(move || {
                    let _guard = lock.acquire_read(WAIT).unwrap();
                    tx.send(()).unwrap();
                    done_rx.lock().recv().unwrap();
                })
            })
            .collect();

        for _ in 0..3 {
            rx.recv().unwrap();
        }
        assert_eq!(lock.reader_count(), 3);

        for _ in 0..3 {
            done_tx.send(()).unwrap();
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(lock.reader_count(), 0);
    }
}
