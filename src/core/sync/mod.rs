/*!
 * Synchronization Primitives
 *
 * Blocking and lock-free building blocks for shared-memory threads:
 * - Scoped exclusive and reader/writer locks with bounded waits
 * - Bounded producer/consumer queue with cooperative cancellation
 * - Lock-free atomic cells and reference swaps
 * - Spin barriers, completion signals and counting semaphores
 *
 * # Suspension points
 *
 * Only lock/rwlock acquisition, `put` on a full queue, `take` on an empty
 * queue, signal and semaphore waits, and spin-barrier backoff ever block.
 * Atomic and swap cells never do.
 *
 * # Errors
 *
 * Nothing is retried internally. Every failure reaches the immediate
 * caller as a [`SyncError`](crate::core::errors::SyncError).
 */

mod atomic;
mod cancel;
mod config;
mod holds;
mod lock;
mod queue;
mod rwlock;
mod semaphore;
mod signal;
mod spinwait;
mod swap;

pub use atomic::{AtomicCell, AtomicPrimitive};
pub use cancel::{CancellationRegistration, CancellationToken};
pub use config::{
    SyncConfig, LOCK_TIMEOUT_ENV, QUEUE_CAPACITY_ENV, QUEUE_TIMEOUT_ENV, SIGNAL_TIMEOUT_ENV,
    SPIN_PROFILE_ENV,
};
pub use lock::{ScopedLock, ScopedLockGuard};
pub use queue::{BoundedQueue, ConsumingIter, PutError, QueueOrder, QueuePhase, QueueStats};
pub use rwlock::{ReadGuard, ScopedRwLock, WriteGuard};
pub use semaphore::{Semaphore, SemaphorePermit};
pub use signal::{Signal, SignalMode};
pub use spinwait::{spin_until, EscalationPolicy, SpinBarrier, SpinOutcome, SpinPhase, SpinWait};
pub use swap::SwapCell;
