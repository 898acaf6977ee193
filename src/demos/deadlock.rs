/*!
 * Lock-Ordering Hazard
 *
 * Two threads take the same pair of locks in opposite orders. Without a
 * bound this hangs forever; with bounded waits it surfaces as `Timeout`.
 * The toolkit does not reorder locks for the caller, and this scenario
 * exists to show what happens when the caller gets the order wrong.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::ScopedLock;
use serde::{Deserialize, Serialize};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LockOutcome {
    /// Got both locks
    Completed,
    /// Gave up waiting for the second lock
    TimedOut { waiting_for: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlockReport {
    pub first_then_second: LockOutcome,
    pub second_then_first: LockOutcome,
}

impl DeadlockReport {
    pub fn timeouts(&self) -> usize {
        [&self.first_then_second, &self.second_then_first]
            .into_iter()
            .filter(|outcome| matches!(outcome, LockOutcome::TimedOut { .. }))
            .count()
    }
}

fn lock_both(
    outer: &ScopedLock<()>,
    inner: &ScopedLock<()>,
    both_hold_outer: &Barrier,
    timeout: Duration,
) -> SyncResult<LockOutcome> {
    let _outer = outer.acquire(timeout)?;
    both_hold_outer.wait();

    match inner.acquire(timeout) {
        Ok(_inner) => Ok(LockOutcome::Completed),
        Err(SyncError::Timeout { resource, .. }) => {
            warn!(holding = outer.name(), waiting_for = %resource, "lock ordering cycle detected by timeout");
            Ok(LockOutcome::TimedOut { waiting_for: resource })
        }
        Err(err) => Err(err),
    }
}

/// Reproduce the two-lock cycle with bounded waits
pub fn run(timeout: Duration) -> SyncResult<DeadlockReport> {
    let first = ScopedLock::named("first_lock", ());
    let second = ScopedLock::named("second_lock", ());
    let barrier = Barrier::new(2);

    let (a, b) = thread::scope(|scope| {
        let a = scope.spawn(|| lock_both(&first, &second, &barrier, timeout));
        let b = scope.spawn(|| lock_both(&second, &first, &barrier, timeout));
        (
            a.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
            b.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
        )
    });

    let report = DeadlockReport {
        first_then_second: a?,
        second_then_first: b?,
    };
    info!(timeouts = report.timeouts(), "lock ordering scenario finished");
    Ok(report)
}
