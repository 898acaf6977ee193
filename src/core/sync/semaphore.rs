/*!
 * Counting Semaphore
 *
 * Limits how many threads may be inside a region at once. Permits come
 * back automatically when the [`SemaphorePermit`] is dropped.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::guard::{Guard, GuardMetadata, TimeoutContext, TimeoutPolicy};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

/// Counting semaphore with a fixed maximum
///
/// # Example
///
/// ```
/// use sync_toolkit::core::sync::Semaphore;
/// use std::time::Duration;
///
/// let bouncer = Semaphore::new(1, 3)?;
/// let permit = bouncer.acquire(Duration::from_millis(50))?;
/// assert_eq!(bouncer.available(), 0);
/// drop(permit);
/// assert_eq!(bouncer.available(), 1);
/// # Ok::<(), sync_toolkit::SyncError>(())
/// ```
pub struct Semaphore {
    name: &'static str,
    max: usize,
    permits: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    /// Start with `initial` free permits out of at most `max`
    pub fn new(initial: usize, max: usize) -> SyncResult<Self> {
        Self::named("semaphore", initial, max)
    }

    pub fn named(name: &'static str, initial: usize, max: usize) -> SyncResult<Self> {
        if max == 0 {
            return Err(SyncError::InvalidCapacity(max));
        }
        if initial > max {
            return Err(SyncError::SemaphoreOverflow {
                requested: initial,
                max,
            });
        }
        Ok(Self {
            name,
            max,
            permits: Mutex::new(initial),
            cond: Condvar::new(),
        })
    }

    /// Take one permit, waiting at most `timeout`
    pub fn acquire(&self, timeout: Duration) -> SyncResult<SemaphorePermit<'_>> {
        self.acquire_with(TimeoutPolicy::Lock(timeout))
    }

    pub fn acquire_with(&self, policy: TimeoutPolicy) -> SyncResult<SemaphorePermit<'_>> {
        let ctx = TimeoutContext::new(policy, self.name);
        let deadline = ctx.deadline();
        let mut permits = self.permits.lock();

        while *permits == 0 {
            if ctx.is_expired() {
                debug!(resource = self.name, "semaphore acquisition timed out");
                return Err(ctx.timeout_error());
            }
            match deadline {
                Some(deadline) => {
                    self.cond.wait_until(&mut permits, deadline);
                }
                None => self.cond.wait(&mut permits),
            }
        }

        *permits -= 1;
        Ok(self.permit())
    }

    /// Take a permit only if one is free right now
    pub fn try_acquire(&self) -> Option<SemaphorePermit<'_>> {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return None;
        }
        *permits -= 1;
        Some(self.permit())
    }

    pub fn available(&self) -> usize {
        *self.permits.lock()
    }

    pub fn max_permits(&self) -> usize {
        self.max
    }

    /// Return `n` permits to the pool
    ///
    /// # Errors
    ///
    /// `SemaphoreOverflow` if that would exceed the maximum; nothing changes.
    pub fn add_permits(&self, n: usize) -> SyncResult<()> {
        let mut permits = self.permits.lock();
        if permits.checked_add(n).map_or(true, |total| total > self.max) {
            return Err(SyncError::SemaphoreOverflow {
                requested: n,
                max: self.max,
            });
        }
        *permits += n;
        for _ in 0..n {
            self.cond.notify_one();
        }
        Ok(())
    }

    fn permit(&self) -> SemaphorePermit<'_> {
        SemaphorePermit {
            semaphore: self,
            metadata: GuardMetadata::new(self.name),
        }
    }

    fn release_one(&self) {
        let mut permits = self.permits.lock();
        // `add_permits` may have refilled the pool while this permit was out
        *permits = (*permits + 1).min(self.max);
        self.cond.notify_one();
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("name", &self.name)
            .field("available", &self.available())
            .field("max", &self.max)
            .finish()
    }
}

/// One unit of a [`Semaphore`]; returned on drop
#[must_use = "the permit is returned as soon as it is dropped"]
#[derive(Debug)]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
    metadata: GuardMetadata,
}

impl SemaphorePermit<'_> {
    /// Consume the permit without returning it to the pool
    pub fn forget(self) {
        trace!(resource = self.metadata.resource_type, "permit forgotten");
        std::mem::forget(self);
    }
}

impl Guard for SemaphorePermit<'_> {
    fn resource_type(&self) -> &'static str {
        self.metadata.resource_type
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.semaphore.release_one();
        trace!(
            resource = self.metadata.resource_type,
            held_us = self.metadata.lifetime_micros(),
            "permit released"
        );
    }
}
