/*!
 * Cooperative Cancellation
 *
 * A cloneable token that blocked operations observe. Cancelling never
 * interrupts a thread; it flips a flag and runs registered wake-up
 * callbacks so that waiters re-check and bail out promptly.
 */

use crate::core::errors::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

type Callback = Box<dyn FnOnce() + Send>;

struct TokenInner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, Callback)>>,
    /// Link to the parent's callback list; unregistered when this token goes
    parent_link: Mutex<Option<CancellationRegistration>>,
}

impl TokenInner {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        // Run outside the lock: callbacks may take other locks or register
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        trace!(callbacks = callbacks.len(), "cancellation requested");
        for (_, callback) in callbacks {
            callback();
        }
    }
}

/// Cooperative cancellation signal
///
/// Clones share state: cancelling any clone cancels them all.
///
/// # Example
///
/// ```
/// use sync_toolkit::core::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let child = token.child_token();
///
/// token.cancel();
/// assert!(child.is_cancelled());
/// assert!(child.check().is_err());
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
                callbacks: Mutex::new(Vec::new()),
                parent_link: Mutex::new(None),
            }),
        }
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation has been requested
    pub fn check(&self) -> SyncResult<()> {
        if self.is_cancelled() {
            Err(SyncError::cancelled("cancellation_token"))
        } else {
            Ok(())
        }
    }

    /// Create a token that is cancelled whenever this one is
    ///
    /// Cancelling the child does not affect the parent.
    pub fn child_token(&self) -> CancellationToken {
        let child = CancellationToken::new();
        let weak: Weak<TokenInner> = Arc::downgrade(&child.inner);
        let registration = self.register(move || {
            if let Some(child) = weak.upgrade() {
                child.cancel();
            }
        });
        *child.inner.parent_link.lock() = Some(registration);
        child
    }

    /// Run `callback` once when cancellation is requested
    ///
    /// Runs immediately on the calling thread if the token is already
    /// cancelled. Dropping the returned registration unregisters the
    /// callback if it has not run yet.
    pub fn register<F>(&self, callback: F) -> CancellationRegistration
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut callbacks = self.inner.callbacks.lock();
            // Checked under the lock: `cancel` sets the flag before draining
            if !self.is_cancelled() {
                callbacks.push((id, Box::new(callback)));
                return CancellationRegistration {
                    token: Some(Arc::downgrade(&self.inner)),
                    id,
                };
            }
        }

        callback();
        CancellationRegistration { token: None, id }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Handle for a registered cancellation callback
#[must_use = "dropping the registration unregisters the callback"]
pub struct CancellationRegistration {
    token: Option<Weak<TokenInner>>,
    id: u64,
}

impl Drop for CancellationRegistration {
    fn drop(&mut self) {
        if let Some(inner) = self.token.take().and_then(|weak| weak.upgrade()) {
            inner.callbacks.lock().retain(|(id, _)| *id != self.id);
        }
    }
}
