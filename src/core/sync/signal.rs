/*!
 * Completion Signal
 *
 * One-bit event a waiter blocks on until another thread sets it.
 *
 * | Mode     | `set` releases           | After release           |
 * |----------|--------------------------|-------------------------|
 * | `manual` | every waiter (broadcast) | stays set until `reset` |
 * | `auto`   | exactly one waiter       | resets itself           |
 *
 * An `auto` signal set with nobody waiting stays set until the next
 * waiter consumes it.
 */

use crate::core::errors::SyncResult;
use crate::core::guard::{TimeoutContext, TimeoutPolicy};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalMode {
    /// Broadcast; stays set until reset
    Manual,
    /// Single waiter; resets on release
    Auto,
}

/// Settable event with bounded wait
///
/// # Example
///
/// ```
/// use sync_toolkit::core::sync::Signal;
/// use std::sync::Arc;
/// use std::thread;
/// use std::time::Duration;
///
/// let done = Arc::new(Signal::auto());
/// let notifier = done.clone();
/// thread::spawn(move || notifier.set());
///
/// done.wait(Some(Duration::from_secs(1)))?;
/// assert!(!done.is_set());
/// # Ok::<(), sync_toolkit::SyncError>(())
/// ```
#[derive(Debug)]
pub struct Signal {
    mode: SignalMode,
    state: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub fn manual() -> Self {
        Self::with_mode(SignalMode::Manual)
    }

    pub fn auto() -> Self {
        Self::with_mode(SignalMode::Auto)
    }

    pub fn with_mode(mode: SignalMode) -> Self {
        Self {
            mode,
            state: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub fn mode(&self) -> SignalMode {
        self.mode
    }

    pub fn set(&self) {
        let mut set = self.state.lock();
        *set = true;
        match self.mode {
            SignalMode::Manual => {
                self.cond.notify_all();
            }
            SignalMode::Auto => {
                self.cond.notify_one();
            }
        }
        trace!(mode = ?self.mode, "signal set");
    }

    pub fn reset(&self) {
        *self.state.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.state.lock()
    }

    /// Block until set; `None` waits forever
    ///
    /// # Errors
    ///
    /// `Timeout` if the signal was not set within `timeout`.
    pub fn wait(&self, timeout: Option<Duration>) -> SyncResult<()> {
        self.wait_with(timeout.map_or(TimeoutPolicy::None, TimeoutPolicy::Signal))
    }

    pub fn wait_with(&self, policy: TimeoutPolicy) -> SyncResult<()> {
        let ctx = TimeoutContext::new(policy, "signal");
        let deadline = ctx.deadline();
        let mut set = self.state.lock();

        while !*set {
            if ctx.is_expired() {
                debug!(mode = ?self.mode, "signal wait timed out");
                return Err(ctx.timeout_error());
            }
            match deadline {
                Some(deadline) => {
                    self.cond.wait_until(&mut set, deadline);
                }
                None => self.cond.wait(&mut set),
            }
        }

        if self.mode == SignalMode::Auto {
            *set = false;
        }
        Ok(())
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::manual()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::SyncError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_manual_signal_broadcasts() {
        let signal = Arc::new(Signal::manual());
        let released = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let signal = signal.clone();
                let released = released.clone();
                thread::spawn(move || {
                    signal.wait(Some(Duration::from_secs(2))).unwrap();
                    released.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        signal.set();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(released.load(Ordering::SeqCst), 3);
        assert!(signal.is_set());
        signal.reset();
        assert!(!signal.is_set());
    }

    #[test]
    fn test_auto_signal_releases_one() {
        let signal = Signal::auto();
        signal.set();

        assert!(signal.wait(Some(Duration::from_millis(10))).is_ok());
        // Consumed by the first waiter
        assert!(matches!(
            signal.wait(Some(Duration::from_millis(10))),
            Err(SyncError::Timeout { .. })
        ));
    }

    #[test]
    fn test_wait_timeout() {
        let signal = Signal::manual();
        let err = signal.wait(Some(Duration::from_millis(15))).unwrap_err();
        assert!(err.is_timeout());
    }
}
