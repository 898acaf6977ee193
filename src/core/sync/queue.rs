/*!
 * Bounded Blocking Queue
 *
 * Fixed-capacity buffer connecting N producers to M consumers.
 *
 * # Lifecycle
 *
 * ```text
 *   Open ──complete_adding / cancel_all──▶ Draining ──last item taken──▶ Closed
 *     └─────────────(already empty)───────────────────────────────────────▲
 * ```
 *
 * - **Open**: `put` and `take` both accepted.
 * - **Draining**: `put` fails; queued items can still be taken.
 * - **Closed**: empty for good; `take` reports end of stream.
 *
 * # Guarantees
 *
 * - `len()` never exceeds `capacity()`.
 * - Items come out in insertion order (or reverse, for a LIFO queue), with
 *   no loss or duplication. The order is fixed at construction.
 * - A cancelled or timed-out `put` leaves the queue untouched and hands the
 *   item back inside [`PutError`].
 * - A waiter that leaves without using its wake-up passes it on, so space
 *   or items never sit unnoticed while others are blocked.
 */

use super::cancel::{CancellationRegistration, CancellationToken};
use crate::core::errors::{SyncError, SyncResult};
use crate::core::guard::{TimeoutContext, TimeoutPolicy};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Upper bound on eager buffer allocation
const MAX_PREALLOCATION: usize = 1024;

/// Delivery order, fixed for the queue's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOrder {
    /// First in, first out
    #[default]
    Fifo,
    /// Last in, first out (stack-backed)
    Lifo,
}

/// Lifecycle phase of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePhase {
    Open,
    Draining,
    Closed,
}

/// Point-in-time queue snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub name: String,
    pub len: usize,
    pub capacity: usize,
    pub order: QueueOrder,
    pub phase: QueuePhase,
    pub waiting_producers: usize,
    pub waiting_consumers: usize,
    pub total_put: u64,
    pub total_taken: u64,
}

/// A `put` that did not happen; carries the item back to the caller
pub struct PutError<T> {
    item: T,
    error: SyncError,
}

impl<T> PutError<T> {
    fn new(item: T, error: SyncError) -> Self {
        Self { item, error }
    }

    pub fn error(&self) -> &SyncError {
        &self.error
    }

    /// Recover the item that was not inserted
    pub fn into_inner(self) -> T {
        self.item
    }

    pub fn into_parts(self) -> (T, SyncError) {
        (self.item, self.error)
    }
}

impl<T> From<PutError<T>> for SyncError {
    fn from(err: PutError<T>) -> Self {
        err.error
    }
}

impl<T> fmt::Debug for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutError").field("error", &self.error).finish_non_exhaustive()
    }
}

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T> std::error::Error for PutError<T> {}

struct QueueState<T> {
    items: VecDeque<T>,
    phase: QueuePhase,
    /// Set by `cancel_all`; distinguishes Cancelled from Closed for producers
    cancelled: bool,
    waiting_producers: usize,
    waiting_consumers: usize,
    total_put: u64,
    total_taken: u64,
}

struct Shared<T> {
    name: &'static str,
    capacity: usize,
    order: QueueOrder,
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> Shared<T> {
    fn pop(&self, state: &mut QueueState<T>) -> Option<T> {
        match self.order {
            QueueOrder::Fifo => state.items.pop_front(),
            QueueOrder::Lifo => state.items.pop_back(),
        }
    }

    /// Hand a possibly-consumed producer wake-up to the next producer
    fn pass_on_space(&self, state: &QueueState<T>) {
        if state.items.len() < self.capacity && state.waiting_producers > 0 {
            self.not_full.notify_one();
        }
    }

    /// Hand a possibly-consumed consumer wake-up to the next consumer
    fn pass_on_items(&self, state: &QueueState<T>) {
        if !state.items.is_empty() && state.waiting_consumers > 0 {
            self.not_empty.notify_one();
        }
    }

    fn stop_accepting(&self, state: &mut QueueState<T>) {
        if state.phase == QueuePhase::Open {
            state.phase = if state.items.is_empty() {
                QueuePhase::Closed
            } else {
                QueuePhase::Draining
            };
        }
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    fn refusal(&self, state: &QueueState<T>) -> SyncError {
        if state.cancelled {
            SyncError::cancelled(self.name)
        } else {
            SyncError::closed(self.name)
        }
    }
}

/// Bounded producer/consumer queue
///
/// Cloning is cheap and yields another handle to the same queue.
///
/// # Example
///
/// ```
/// use sync_toolkit::core::sync::BoundedQueue;
/// use std::thread;
///
/// let queue = BoundedQueue::new(1)?;
/// let producer = queue.clone();
/// let handle = thread::spawn(move || {
///     for i in 1..=5 {
///         producer.put(i).unwrap();
///     }
///     producer.complete_adding();
/// });
///
/// let received: Vec<_> = queue.iter().collect();
/// handle.join().unwrap();
/// assert_eq!(received, vec![1, 2, 3, 4, 5]);
/// # Ok::<(), sync_toolkit::SyncError>(())
/// ```
pub struct BoundedQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> BoundedQueue<T> {
    /// FIFO queue holding at most `capacity` items
    pub fn new(capacity: usize) -> SyncResult<Self> {
        Self::named("bounded_queue", capacity, QueueOrder::Fifo)
    }

    pub fn with_order(capacity: usize, order: QueueOrder) -> SyncResult<Self> {
        Self::named("bounded_queue", capacity, order)
    }

    /// Create a queue whose name shows up in errors and traces
    pub fn named(name: &'static str, capacity: usize, order: QueueOrder) -> SyncResult<Self> {
        if capacity == 0 {
            return Err(SyncError::InvalidCapacity(capacity));
        }

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                capacity,
                order,
                state: Mutex::new(QueueState {
                    items: VecDeque::with_capacity(capacity.min(MAX_PREALLOCATION)),
                    phase: QueuePhase::Open,
                    cancelled: false,
                    waiting_producers: 0,
                    waiting_consumers: 0,
                    total_put: 0,
                    total_taken: 0,
                }),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
            }),
        })
    }

    /// Insert, blocking while the queue is full
    ///
    /// # Errors
    ///
    /// `Closed` after [`complete_adding`](Self::complete_adding), `Cancelled`
    /// after [`cancel_all`](Self::cancel_all).
    pub fn put(&self, item: T) -> Result<(), PutError<T>> {
        self.put_inner(item, None, TimeoutPolicy::None)
    }

    /// Insert, giving up with `Timeout` after `timeout`
    pub fn put_timeout(&self, item: T, timeout: Duration) -> Result<(), PutError<T>> {
        self.put_inner(item, None, TimeoutPolicy::Queue(timeout))
    }

    /// Insert only if there is room right now
    ///
    /// Hands the item back when the queue is full or no longer open.
    pub fn try_put(&self, item: T) -> Result<(), T> {
        let mut state = self.shared.state.lock();
        if state.phase != QueuePhase::Open || state.items.len() >= self.shared.capacity {
            return Err(item);
        }
        self.push(&mut state, item);
        Ok(())
    }

    /// Remove the next item, blocking while the queue is empty and open
    ///
    /// Returns `None` once the queue is draining/closed and empty: the end
    /// of the stream, not an error.
    pub fn take(&self) -> Option<T> {
        self.take_inner(None, TimeoutPolicy::None).ok().flatten()
    }

    /// Like [`take`](Self::take), giving up with `Timeout` after `timeout`
    pub fn take_timeout(&self, timeout: Duration) -> SyncResult<Option<T>> {
        self.take_inner(None, TimeoutPolicy::Queue(timeout))
    }

    /// Remove the next item only if one is available right now
    pub fn try_take(&self) -> Option<T> {
        let mut state = self.shared.state.lock();
        self.pop_available(&mut state)
    }

    /// Stop accepting items; consumers drain what is left
    ///
    /// Blocked and future producers fail with `Closed`. Idempotent.
    pub fn complete_adding(&self) {
        let mut state = self.shared.state.lock();
        self.shared.stop_accepting(&mut state);
        debug!(
            queue = self.shared.name,
            remaining = state.items.len(),
            phase = ?state.phase,
            "adding completed"
        );
    }

    /// Abort all waiting and future producers
    ///
    /// Blocked producers fail with `Cancelled`; blocked consumers see end of
    /// stream once the queue is empty. Items already queued stay takeable.
    /// Idempotent.
    pub fn cancel_all(&self) {
        let mut state = self.shared.state.lock();
        state.cancelled = true;
        self.shared.stop_accepting(&mut state);
        debug!(
            queue = self.shared.name,
            remaining = state.items.len(),
            waiting_producers = state.waiting_producers,
            waiting_consumers = state.waiting_consumers,
            "queue cancelled"
        );
    }

    /// Consuming iterator that ends at end of stream
    pub fn iter(&self) -> ConsumingIter<'_, T> {
        ConsumingIter { queue: self }
    }

    pub fn phase(&self) -> QueuePhase {
        self.shared.state.lock().phase
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn order(&self) -> QueueOrder {
        self.shared.order
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.shared.state.lock();
        QueueStats {
            name: self.shared.name.to_string(),
            len: state.items.len(),
            capacity: self.shared.capacity,
            order: self.shared.order,
            phase: state.phase,
            waiting_producers: state.waiting_producers,
            waiting_consumers: state.waiting_consumers,
            total_put: state.total_put,
            total_taken: state.total_taken,
        }
    }

    fn push(&self, state: &mut MutexGuard<'_, QueueState<T>>, item: T) {
        state.items.push_back(item);
        state.total_put += 1;
        self.shared.not_empty.notify_one();
    }

    fn pop_available(&self, state: &mut MutexGuard<'_, QueueState<T>>) -> Option<T> {
        let item = self.shared.pop(state)?;
        state.total_taken += 1;
        if state.phase == QueuePhase::Draining && state.items.is_empty() {
            state.phase = QueuePhase::Closed;
            trace!(queue = self.shared.name, "queue drained and closed");
        }
        self.shared.not_full.notify_one();
        Some(item)
    }

    fn put_inner(
        &self,
        item: T,
        cancel: Option<&CancellationToken>,
        policy: TimeoutPolicy,
    ) -> Result<(), PutError<T>> {
        let shared = &*self.shared;
        let ctx = TimeoutContext::new(policy, shared.name);
        let deadline = ctx.deadline();
        let mut state = shared.state.lock();

        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                shared.pass_on_space(&state);
                return Err(PutError::new(item, SyncError::cancelled(shared.name)));
            }

            if state.phase != QueuePhase::Open {
                let error = shared.refusal(&state);
                return Err(PutError::new(item, error));
            }

            if state.items.len() < shared.capacity {
                self.push(&mut state, item);
                return Ok(());
            }

            if ctx.is_expired() {
                shared.pass_on_space(&state);
                debug!(queue = shared.name, "put timed out on full queue");
                return Err(PutError::new(item, ctx.timeout_error()));
            }

            state.waiting_producers += 1;
            match deadline {
                Some(deadline) => {
                    shared.not_full.wait_until(&mut state, deadline);
                }
                None => shared.not_full.wait(&mut state),
            }
            state.waiting_producers -= 1;
        }
    }

    fn take_inner(
        &self,
        cancel: Option<&CancellationToken>,
        policy: TimeoutPolicy,
    ) -> SyncResult<Option<T>> {
        let shared = &*self.shared;
        let ctx = TimeoutContext::new(policy, shared.name);
        let deadline = ctx.deadline();
        let mut state = shared.state.lock();

        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                shared.pass_on_items(&state);
                return Err(SyncError::cancelled(shared.name));
            }

            if let Some(item) = self.pop_available(&mut state) {
                return Ok(Some(item));
            }

            if state.phase != QueuePhase::Open {
                state.phase = QueuePhase::Closed;
                return Ok(None);
            }

            if ctx.is_expired() {
                shared.pass_on_items(&state);
                debug!(queue = shared.name, "take timed out on empty queue");
                return Err(ctx.timeout_error());
            }

            state.waiting_consumers += 1;
            match deadline {
                Some(deadline) => {
                    shared.not_empty.wait_until(&mut state, deadline);
                }
                None => shared.not_empty.wait(&mut state),
            }
            state.waiting_consumers -= 1;
        }
    }
}

impl<T: Send + 'static> BoundedQueue<T> {
    /// Insert, blocking while full, abandoning the attempt if `token` fires
    ///
    /// On cancellation the queue is left exactly as if the call had never
    /// been made and the item is returned in the error.
    pub fn put_cancellable(&self, item: T, token: &CancellationToken) -> Result<(), PutError<T>> {
        self.put_cancellable_with(item, token, TimeoutPolicy::None)
    }

    /// [`put_cancellable`](Self::put_cancellable) that also gives up under `policy`
    pub fn put_cancellable_with(
        &self,
        item: T,
        token: &CancellationToken,
        policy: TimeoutPolicy,
    ) -> Result<(), PutError<T>> {
        let _registration = self.register_waker(token);
        self.put_inner(item, Some(token), policy)
    }

    /// Remove the next item, abandoning the wait if `token` fires
    pub fn take_cancellable(&self, token: &CancellationToken) -> SyncResult<Option<T>> {
        self.take_cancellable_with(token, TimeoutPolicy::None)
    }

    pub fn take_cancellable_with(
        &self,
        token: &CancellationToken,
        policy: TimeoutPolicy,
    ) -> SyncResult<Option<T>> {
        let _registration = self.register_waker(token);
        self.take_inner(Some(token), policy)
    }

    /// Wake every waiter on this queue when `token` fires
    ///
    /// Must be called before taking the state lock: the callback takes it
    /// and runs inline if the token is already cancelled.
    fn register_waker(&self, token: &CancellationToken) -> CancellationRegistration {
        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        token.register(move || {
            if let Some(shared) = weak.upgrade() {
                // Taking the lock orders this wake-up after any in-flight check
                let _state = shared.state.lock();
                shared.not_full.notify_all();
                shared.not_empty.notify_all();
            }
        })
    }
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("BoundedQueue")
            .field("name", &self.shared.name)
            .field("len", &state.items.len())
            .field("capacity", &self.shared.capacity)
            .field("order", &self.shared.order)
            .field("phase", &state.phase)
            .finish()
    }
}

/// Blocking iterator over a [`BoundedQueue`]; ends at end of stream
pub struct ConsumingIter<'a, T> {
    queue: &'a BoundedQueue<T>,
}

impl<T> Iterator for ConsumingIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.take()
    }
}

impl<'a, T> IntoIterator for &'a BoundedQueue<T> {
    type Item = T;
    type IntoIter = ConsumingIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            BoundedQueue::<u8>::new(0),
            Err(SyncError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn test_fifo_order() {
        let queue = BoundedQueue::new(4).unwrap();
        for i in 0..4 {
            queue.put(i).unwrap();
        }
        let taken: Vec<_> = (0..4).filter_map(|_| queue.try_take()).collect();
        assert_eq!(taken, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_lifo_order() {
        let queue = BoundedQueue::with_order(4, QueueOrder::Lifo).unwrap();
        for i in 0..4 {
            queue.put(i).unwrap();
        }
        let taken: Vec<_> = (0..4).filter_map(|_| queue.try_take()).collect();
        assert_eq!(taken, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_try_put_respects_capacity() {
        let queue = BoundedQueue::new(2).unwrap();
        assert!(queue.try_put('a').is_ok());
        assert!(queue.try_put('b').is_ok());
        assert_eq!(queue.try_put('c'), Err('c'));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_put_timeout_returns_item() {
        let queue = BoundedQueue::new(1).unwrap();
        queue.put(1).unwrap();

        let start = Instant::now();
        let err = queue.put_timeout(2, Duration::from_millis(30)).unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(err.error().is_timeout());
        assert_eq!(err.into_inner(), 2);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_take_timeout_on_empty() {
        let queue = BoundedQueue::<u32>::new(1).unwrap();
        let result = queue.take_timeout(Duration::from_millis(20));
        assert!(matches!(result, Err(SyncError::Timeout { .. })));
    }

    #[test]
    fn test_complete_adding_drains_then_ends() {
        let queue = BoundedQueue::new(3).unwrap();
        queue.put("fork").unwrap();
        queue.put("spoon").unwrap();
        queue.complete_adding();

        assert_eq!(queue.phase(), QueuePhase::Draining);
        assert!(matches!(queue.put("knife").unwrap_err().error(), SyncError::Closed { .. }));

        assert_eq!(queue.take(), Some("fork"));
        assert_eq!(queue.take(), Some("spoon"));
        assert_eq!(queue.phase(), QueuePhase::Closed);
        assert_eq!(queue.take(), None);
    }

    #[test]
    fn test_complete_adding_on_empty_closes() {
        let queue = BoundedQueue::<u8>::new(1).unwrap();
        queue.complete_adding();
        queue.complete_adding();
        assert_eq!(queue.phase(), QueuePhase::Closed);
    }

    #[test]
    fn test_cancel_all_wakes_blocked_producer() {
        let queue = BoundedQueue::new(1).unwrap();
        queue.put(0).unwrap();

        let producer = queue.clone();
        let handle = thread::spawn(move || producer.put(1).map_err(|e| e.into_parts()));

        thread::sleep(Duration::from_millis(50));
        queue.cancel_all();

        let (item, error) = handle.join().unwrap().unwrap_err();
        assert_eq!(item, 1);
        assert!(error.is_cancelled());
        // Already-queued item survives cancellation
        assert_eq!(queue.take(), Some(0));
        assert_eq!(queue.take(), None);
    }

    #[test]
    fn test_cancel_all_wakes_blocked_consumer() {
        let queue = BoundedQueue::<u32>::new(1).unwrap();
        let consumer = queue.clone();
        let handle = thread::spawn(move || consumer.take());

        thread::sleep(Duration::from_millis(50));
        queue.cancel_all();

        assert_eq!(handle.join().unwrap(), None);
        assert_eq!(queue.phase(), QueuePhase::Closed);
    }

    #[test]
    fn test_token_cancels_blocked_put() {
        let queue = BoundedQueue::new(1).unwrap();
        queue.put(10).unwrap();
        let token = CancellationToken::new();

        let producer = queue.clone();
        let producer_token = token.clone();
        let handle = thread::spawn(move || {
            producer
                .put_cancellable(11, &producer_token)
                .map_err(|e| e.into_parts())
        });

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        let (item, error) = handle.join().unwrap().unwrap_err();
        assert_eq!(item, 11);
        assert!(error.is_cancelled());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.phase(), QueuePhase::Open);
    }

    #[test]
    fn test_token_cancels_blocked_take() {
        let queue = BoundedQueue::<u8>::new(1).unwrap();
        let token = CancellationToken::new();

        let consumer = queue.clone();
        let consumer_token = token.clone();
        let handle = thread::spawn(move || consumer.take_cancellable(&consumer_token));

        thread::sleep(Duration::from_millis(50));
        token.cancel();

        assert!(matches!(handle.join().unwrap(), Err(SyncError::Cancelled { .. })));
    }

    #[test]
    fn test_cancellable_put_honours_timeout() {
        let queue = BoundedQueue::new(1).unwrap();
        queue.put(1).unwrap();
        let token = CancellationToken::new();

        let err = queue
            .put_cancellable_with(2, &token, TimeoutPolicy::Queue(Duration::from_millis(20)))
            .unwrap_err();
        assert!(err.error().is_timeout());
        assert_eq!(err.into_inner(), 2);

        assert_eq!(queue.try_take(), Some(1));
        let empty = queue.take_cancellable_with(&token, TimeoutPolicy::Queue(Duration::from_millis(20)));
        assert!(empty.unwrap_err().is_timeout());
    }

    #[test]
    fn test_stats_snapshot() {
        let queue = BoundedQueue::named("dishes", 2, QueueOrder::Lifo).unwrap();
        queue.put(1).unwrap();
        queue.put(2).unwrap();
        queue.try_take();

        let stats = queue.stats();
        assert_eq!(stats.name, "dishes");
        assert_eq!(stats.len, 1);
        assert_eq!(stats.total_put, 2);
        assert_eq!(stats.total_taken, 1);
        assert_eq!(stats.order, QueueOrder::Lifo);
        assert_eq!(stats.phase, QueuePhase::Open);
    }
}
