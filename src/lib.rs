/*!
 * Sync Toolkit Library
 * Concurrency primitives and the demo scenarios built on them
 */

pub mod core;
pub mod demos;
pub mod monitoring;

// Re-exports
pub use crate::core::errors::{SyncError, SyncResult};
pub use crate::core::guard::{Guard, TimeoutPolicy};
pub use crate::core::sync::{
    AtomicCell, BoundedQueue, CancellationToken, EscalationPolicy, QueueOrder, QueuePhase,
    ScopedLock, ScopedRwLock, Semaphore, Signal, SpinBarrier, SpinWait, SwapCell, SyncConfig,
};
