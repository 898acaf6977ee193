/*!
 * RAII Resource Guards
 *
 * Every successful acquisition in the toolkit hands back a guard object.
 * Dropping the guard is the only way to release the underlying hold, so
 * release happens exactly once on every exit path: normal return, early
 * return via `?`, or unwinding from a panic.
 *
 * ## Guard Types
 *
 * - **ScopedLockGuard**: exclusive hold on a `ScopedLock`
 * - **ReadGuard / WriteGuard**: shared or exclusive hold on a `ScopedRwLock`
 * - **SemaphorePermit**: one unit of a counting `Semaphore`
 *
 * ## Example
 *
 * ```
 * use sync_toolkit::core::sync::ScopedLock;
 * use std::time::Duration;
 *
 * let balance = ScopedLock::new(100_i64);
 * {
 *     let mut guard = balance.acquire(Duration::from_millis(50))?;
 *     *guard -= 30;
 * } // released here
 * # Ok::<(), sync_toolkit::SyncError>(())
 * ```
 */

mod timeout;
mod traits;

pub use timeout::{TimeoutConfig, TimeoutContext, TimeoutPolicy};
pub use traits::Guard;

use std::time::{Duration, Instant};

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: Instant,
    pub resource_id: u64,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: Instant::now(),
            resource_id: 0,
        }
    }

    #[inline]
    pub fn with_resource_id(mut self, id: u64) -> Self {
        self.resource_id = id;
        self
    }

    /// How long the guard has been alive
    #[inline]
    pub fn held_for(&self) -> Duration {
        self.creation_time.elapsed()
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.held_for().as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let meta = GuardMetadata::new("scoped_lock").with_resource_id(7);
        assert_eq!(meta.resource_type, "scoped_lock");
        assert_eq!(meta.resource_id, 7);
        assert!(meta.held_for() < Duration::from_secs(1));
    }
}
