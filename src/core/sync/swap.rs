/*!
 * Swap Cell
 * Lock-free exchange of a shared reference
 */

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// Shared slot whose contents are replaced atomically
///
/// Readers take a snapshot `Arc<T>` and never block writers; writers swap
/// in a whole new value. Good fit for read-mostly state such as a
/// character's equipped item or a configuration snapshot.
///
/// # Example
///
/// ```
/// use sync_toolkit::core::sync::SwapCell;
///
/// let weapon = SwapCell::new("sword");
/// let previous = weapon.swap("axe");
/// assert_eq!(*previous, "sword");
/// assert_eq!(*weapon.load(), "axe");
/// ```
pub struct SwapCell<T> {
    inner: ArcSwap<T>,
}

impl<T> SwapCell<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// Snapshot the current value
    #[inline]
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    #[inline]
    pub fn store(&self, value: T) {
        self.inner.store(Arc::new(value));
    }

    /// Replace the value, returning the previous one
    #[inline]
    pub fn swap(&self, value: T) -> Arc<T> {
        self.inner.swap(Arc::new(value))
    }

    /// Clone-modify-swap update
    ///
    /// `f` may run more than once if another writer wins the race, so it
    /// must be free of side effects. Returns the value that was replaced.
    pub fn rcu<F>(&self, mut f: F) -> Arc<T>
    where
        F: FnMut(&T) -> T,
    {
        self.inner.rcu(|current| Arc::new(f(&**current)))
    }
}

impl<T: Default> Default for SwapCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for SwapCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SwapCell").field(&*self.load()).finish()
    }
}
