/*!
 * Atomic Cell
 * Lock-free read-modify-write on a single primitive value
 */

use std::fmt;
use std::sync::atomic::{
    AtomicI32, AtomicI64, AtomicIsize, AtomicU32, AtomicU64, AtomicUsize, Ordering,
};

/// Primitive integer types backed by a native atomic
pub trait AtomicPrimitive: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    type Atomic: Send + Sync;

    fn new_atomic(value: Self) -> Self::Atomic;
    fn load(atomic: &Self::Atomic) -> Self;
    fn store(atomic: &Self::Atomic, value: Self);
    fn fetch_add(atomic: &Self::Atomic, delta: Self) -> Self;
    fn fetch_sub(atomic: &Self::Atomic, delta: Self) -> Self;
    fn swap(atomic: &Self::Atomic, value: Self) -> Self;
    fn compare_exchange(atomic: &Self::Atomic, current: Self, new: Self) -> Result<Self, Self>;
    fn into_inner(atomic: Self::Atomic) -> Self;
    fn one() -> Self;
    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;
}

macro_rules! impl_atomic_primitive {
    ($($prim:ty => $atomic:ty),+ $(,)?) => {
        $(
            impl AtomicPrimitive for $prim {
                type Atomic = $atomic;

                #[inline(always)]
                fn new_atomic(value: Self) -> Self::Atomic {
                    <$atomic>::new(value)
                }

                #[inline(always)]
                fn load(atomic: &Self::Atomic) -> Self {
                    atomic.load(Ordering::SeqCst)
                }

                #[inline(always)]
                fn store(atomic: &Self::Atomic, value: Self) {
                    atomic.store(value, Ordering::SeqCst)
                }

                #[inline(always)]
                fn fetch_add(atomic: &Self::Atomic, delta: Self) -> Self {
                    atomic.fetch_add(delta, Ordering::SeqCst)
                }

                #[inline(always)]
                fn fetch_sub(atomic: &Self::Atomic, delta: Self) -> Self {
                    atomic.fetch_sub(delta, Ordering::SeqCst)
                }

                #[inline(always)]
                fn swap(atomic: &Self::Atomic, value: Self) -> Self {
                    atomic.swap(value, Ordering::SeqCst)
                }

                #[inline(always)]
                fn compare_exchange(atomic: &Self::Atomic, current: Self, new: Self) -> Result<Self, Self> {
                    atomic.compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst)
                }

                #[inline(always)]
                fn into_inner(atomic: Self::Atomic) -> Self {
                    atomic.into_inner()
                }

                #[inline(always)]
                fn one() -> Self {
                    1
                }

                #[inline(always)]
                fn wrapping_add(self, rhs: Self) -> Self {
                    <$prim>::wrapping_add(self, rhs)
                }

                #[inline(always)]
                fn wrapping_sub(self, rhs: Self) -> Self {
                    <$prim>::wrapping_sub(self, rhs)
                }
            }
        )+
    };
}

impl_atomic_primitive! {
    i32 => AtomicI32,
    i64 => AtomicI64,
    isize => AtomicIsize,
    u32 => AtomicU32,
    u64 => AtomicU64,
    usize => AtomicUsize,
}

/// Lock-free cell for a shared counter
///
/// Every operation is a single hardware read-modify-write: it never blocks,
/// never fails, and is safe under any number of concurrent callers.
/// Arithmetic wraps on overflow, like the underlying fetch-add.
///
/// Compare-and-swap failures are reported, not retried. Callers that need a
/// read-compute-write loop drive it themselves (see
/// [`SpinWait`](super::SpinWait) for backoff between attempts).
///
/// # Example
///
/// ```
/// use sync_toolkit::core::sync::AtomicCell;
///
/// let armor = AtomicCell::new(0_i32);
/// assert_eq!(armor.increment(), 1);
/// assert_eq!(armor.add(10), 1);
/// assert!(armor.compare_and_swap(11, 5));
/// assert_eq!(armor.load(), 5);
/// ```
pub struct AtomicCell<T: AtomicPrimitive> {
    inner: T::Atomic,
}

impl<T: AtomicPrimitive> AtomicCell<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            inner: T::new_atomic(value),
        }
    }

    #[inline(always)]
    pub fn load(&self) -> T {
        T::load(&self.inner)
    }

    #[inline(always)]
    pub fn store(&self, value: T) {
        T::store(&self.inner, value)
    }

    /// Add `delta`, returning the previous value
    #[inline(always)]
    pub fn add(&self, delta: T) -> T {
        T::fetch_add(&self.inner, delta)
    }

    /// Subtract `delta`, returning the previous value
    #[inline(always)]
    pub fn sub(&self, delta: T) -> T {
        T::fetch_sub(&self.inner, delta)
    }

    /// Add one, returning the new value
    #[inline(always)]
    pub fn increment(&self) -> T {
        T::fetch_add(&self.inner, T::one()).wrapping_add(T::one())
    }

    /// Subtract one, returning the new value
    #[inline(always)]
    pub fn decrement(&self) -> T {
        T::fetch_sub(&self.inner, T::one()).wrapping_sub(T::one())
    }

    /// Replace the value if it currently equals `expected`
    #[inline]
    pub fn compare_and_swap(&self, expected: T, new: T) -> bool {
        T::compare_exchange(&self.inner, expected, new).is_ok()
    }

    /// Like [`compare_and_swap`](Self::compare_and_swap), but reports the value
    /// actually observed on failure so a retry loop can recompute from it
    #[inline]
    pub fn compare_exchange(&self, expected: T, new: T) -> Result<T, T> {
        T::compare_exchange(&self.inner, expected, new)
    }

    /// Store `value`, returning the previous value
    #[inline(always)]
    pub fn exchange(&self, value: T) -> T {
        T::swap(&self.inner, value)
    }

    pub fn into_inner(self) -> T {
        T::into_inner(self.inner)
    }
}

impl<T: AtomicPrimitive + Default> Default for AtomicCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: AtomicPrimitive> fmt::Debug for AtomicCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicCell").field(&self.load()).finish()
    }
}

impl<T: AtomicPrimitive> From<T> for AtomicCell<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
