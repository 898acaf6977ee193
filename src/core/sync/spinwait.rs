/*!
 * Adaptive Spin-Wait Strategy
 *
 * Busy-polling with escalating backoff for waits expected to resolve
 * within microseconds.
 *
 * # Escalation
 *
 * ```text
 *   spin (exponential pause) ──spin_limit──▶ yield ──yield_limit──▶ sleep (doubling, capped)
 * ```
 *
 * # Performance
 *
 * - Reacts faster than a parked wait when the predicate flips quickly
 * - Burns CPU while spinning; the sleep phase bounds the cost of long waits
 *
 * Not a substitute for `ScopedLock`, `ScopedRwLock` or `BoundedQueue` when
 * the wait is of unknown or potentially long duration.
 */

use crate::core::errors::SyncResult;
use crate::core::guard::{TimeoutContext, TimeoutPolicy};
use serde::{Deserialize, Serialize};
use std::hint;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest pure-spin burst is `2^MAX_SPIN_SHIFT` pause instructions
const MAX_SPIN_SHIFT: u32 = 6;

/// How a spinner backs off as a wait drags on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// Iterations of pure busy-spinning
    pub spin_limit: u32,
    /// Iterations of `thread::yield_now` after spinning
    pub yield_limit: u32,
    /// First sleep once yielding is exhausted, capped at `max_sleep`
    pub sleep: Duration,
    /// Cap for the doubling sleep
    pub max_sleep: Duration,
    /// Give up with `Timeout` after this long; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            spin_limit: 100,
            yield_limit: 10,
            sleep: Duration::from_micros(50),
            max_sleep: Duration::from_millis(1),
            timeout: None,
        }
    }
}

impl EscalationPolicy {
    /// Policy optimized for low-latency (< 1ms wait expected)
    pub const fn low_latency() -> Self {
        Self {
            spin_limit: 500,
            yield_limit: 20,
            sleep: Duration::from_micros(10),
            max_sleep: Duration::from_micros(100),
            timeout: None,
        }
    }

    /// Policy optimized for long waits (> 1ms expected)
    pub const fn long_wait() -> Self {
        Self {
            spin_limit: 10,
            yield_limit: 5,
            sleep: Duration::from_micros(100),
            max_sleep: Duration::from_millis(10),
            timeout: None,
        }
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn timeout_policy(&self) -> TimeoutPolicy {
        self.timeout.map_or(TimeoutPolicy::None, TimeoutPolicy::Custom)
    }
}

/// Current escalation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinPhase {
    Spin,
    Yield,
    Sleep,
}

/// Step counter for caller-driven retry loops
///
/// # Example
///
/// ```
/// use sync_toolkit::core::sync::{AtomicCell, SpinWait};
///
/// let armor = AtomicCell::new(10_i32);
/// let mut spinner = SpinWait::new();
/// loop {
///     let current = armor.load();
///     if armor.compare_and_swap(current, current * 2) {
///         break;
///     }
///     spinner.spin_once();
/// }
/// assert_eq!(armor.load(), 20);
/// ```
#[derive(Debug, Clone)]
pub struct SpinWait {
    policy: EscalationPolicy,
    count: u32,
    next_sleep: Duration,
}

impl SpinWait {
    pub fn new() -> Self {
        Self::with_policy(EscalationPolicy::default())
    }

    pub fn with_policy(policy: EscalationPolicy) -> Self {
        Self {
            policy,
            count: 0,
            next_sleep: policy.sleep.min(policy.max_sleep),
        }
    }

    /// Back off once according to the current phase
    pub fn spin_once(&mut self) {
        self.step(None);
    }

    pub fn phase(&self) -> SpinPhase {
        if self.count < self.policy.spin_limit {
            SpinPhase::Spin
        } else if self.count < self.policy.spin_limit.saturating_add(self.policy.yield_limit) {
            SpinPhase::Yield
        } else {
            SpinPhase::Sleep
        }
    }

    /// Number of `spin_once` calls since creation or the last reset
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.next_sleep = self.policy.sleep.min(self.policy.max_sleep);
    }

    /// One backoff step; sleeps never exceed `limit`
    fn step(&mut self, limit: Option<Duration>) {
        match self.phase() {
            SpinPhase::Spin => {
                for _ in 0..(1u32 << self.count.min(MAX_SPIN_SHIFT)) {
                    hint::spin_loop();
                }
            }
            SpinPhase::Yield => thread::yield_now(),
            SpinPhase::Sleep => {
                let nap = limit.map_or(self.next_sleep, |limit| self.next_sleep.min(limit));
                thread::sleep(nap);
                self.next_sleep = self.next_sleep.saturating_mul(2).min(self.policy.max_sleep);
            }
        }
        self.count = self.count.saturating_add(1);
    }
}

impl Default for SpinWait {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a successful `spin_until`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinOutcome {
    /// Backoff steps taken before the predicate held
    pub iterations: u32,
    /// Phase reached when the predicate held
    pub phase: SpinPhase,
    pub elapsed: Duration,
}

/// Poll a predicate under an [`EscalationPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinBarrier {
    policy: EscalationPolicy,
}

impl SpinBarrier {
    pub fn new(policy: EscalationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Spin until `predicate` returns true
    ///
    /// # Errors
    ///
    /// `Timeout` once the policy's timeout elapses with the predicate still false.
    pub fn spin_until<F>(&self, mut predicate: F) -> SyncResult<SpinOutcome>
    where
        F: FnMut() -> bool,
    {
        let start = Instant::now();
        let ctx = TimeoutContext::new(self.policy.timeout_policy(), "spin_barrier");
        let mut spinner = SpinWait::with_policy(self.policy);

        loop {
            if predicate() {
                return Ok(SpinOutcome {
                    iterations: spinner.count(),
                    phase: spinner.phase(),
                    elapsed: start.elapsed(),
                });
            }

            if ctx.is_expired() {
                debug!(
                    iterations = spinner.count(),
                    phase = ?spinner.phase(),
                    "spin wait timed out"
                );
                return Err(ctx.timeout_error());
            }

            spinner.step(ctx.remaining());
        }
    }
}

/// Spin until `predicate` holds under `policy`
pub fn spin_until<F>(predicate: F, policy: &EscalationPolicy) -> SyncResult<SpinOutcome>
where
    F: FnMut() -> bool,
{
    SpinBarrier::new(*policy).spin_until(predicate)
}
