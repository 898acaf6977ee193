/*!
 * Deadlines for Blocking Acquisition
 *
 * Type-safe timeout policies for every blocking operation in the toolkit.
 *
 * ## Timeout Classes
 *
 * - **Lock**: short-lived critical sections (default 3s, matching the
 *   bank-card call sites)
 * - **Queue**: producer/consumer hand-off
 * - **Signal**: waiting for a one-shot completion notification
 * - **Custom**: user-defined
 *
 * ## Example
 *
 * ```
 * use sync_toolkit::core::guard::{TimeoutConfig, TimeoutPolicy};
 * use std::time::Duration;
 *
 * let config = TimeoutConfig::new().with_lock_timeout(Duration::from_millis(50));
 * assert_eq!(config.lock_timeout(), TimeoutPolicy::Lock(Duration::from_millis(50)));
 * ```
 */

use crate::core::errors::SyncError;
use std::time::{Duration, Instant};

/// Timeout policy for blocking operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Wait forever
    #[default]
    None,

    /// Lock acquisition timeout
    Lock(Duration),

    /// Queue put/take timeout
    Queue(Duration),

    /// Signal wait timeout
    Signal(Duration),

    /// Custom timeout
    Custom(Duration),
}

impl TimeoutPolicy {
    /// Default lock timeout: 3s
    pub const fn default_lock() -> Self {
        Self::Lock(Duration::from_secs(3))
    }

    /// Default queue timeout: 10s
    pub const fn default_queue() -> Self {
        Self::Queue(Duration::from_secs(10))
    }

    /// Default signal timeout: 30s
    pub const fn default_signal() -> Self {
        Self::Signal(Duration::from_secs(30))
    }

    /// Bound on the wait, `None` when unbounded
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Lock(d) | Self::Queue(d) | Self::Signal(d) | Self::Custom(d) => Some(*d),
        }
    }

    /// Deadline for an operation started at `start`
    ///
    /// `None` when unbounded, including durations too large to represent.
    pub fn deadline(&self, start: Instant) -> Option<Instant> {
        self.duration().and_then(|d| start.checked_add(d))
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self, start: Instant) -> bool {
        match self.duration() {
            None => false,
            Some(d) => start.elapsed() >= d,
        }
    }

    /// Time left before the deadline, `None` when unbounded
    pub fn remaining(&self, start: Instant) -> Option<Duration> {
        self.duration().map(|d| d.saturating_sub(start.elapsed()))
    }

    /// Category label used in logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lock(_) => "lock",
            Self::Queue(_) => "queue",
            Self::Signal(_) => "signal",
            Self::Custom(_) => "custom",
        }
    }
}

impl From<Duration> for TimeoutPolicy {
    fn from(timeout: Duration) -> Self {
        Self::Custom(timeout)
    }
}

/// Per-category default timeouts
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    lock_timeout: Duration,
    queue_timeout: Duration,
    signal_timeout: Duration,
    enabled: bool,
}

impl TimeoutConfig {
    /// Per-category defaults
    pub fn new() -> Self {
        Self {
            lock_timeout: Duration::from_secs(3),
            queue_timeout: Duration::from_secs(10),
            signal_timeout: Duration::from_secs(30),
            enabled: true,
        }
    }

    /// Every category waits forever
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    pub fn with_signal_timeout(mut self, timeout: Duration) -> Self {
        self.signal_timeout = timeout;
        self
    }

    /// Get timeout for lock operations
    pub fn lock_timeout(&self) -> TimeoutPolicy {
        if self.enabled {
            TimeoutPolicy::Lock(self.lock_timeout)
        } else {
            TimeoutPolicy::None
        }
    }

    /// Get timeout for queue operations
    pub fn queue_timeout(&self) -> TimeoutPolicy {
        if self.enabled {
            TimeoutPolicy::Queue(self.queue_timeout)
        } else {
            TimeoutPolicy::None
        }
    }

    /// Get timeout for signal waits
    pub fn signal_timeout(&self) -> TimeoutPolicy {
        if self.enabled {
            TimeoutPolicy::Signal(self.signal_timeout)
        } else {
            TimeoutPolicy::None
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Timeout context for tracking timeout state across one blocking call
#[derive(Debug, Clone)]
pub struct TimeoutContext {
    policy: TimeoutPolicy,
    start: Instant,
    resource_type: &'static str,
}

impl TimeoutContext {
    pub fn new(policy: TimeoutPolicy, resource_type: &'static str) -> Self {
        Self {
            policy,
            start: Instant::now(),
            resource_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.policy.is_expired(self.start)
    }

    /// Remaining duration, `None` for an unbounded wait
    pub fn remaining(&self) -> Option<Duration> {
        self.policy.remaining(self.start)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.policy.deadline(self.start)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn policy(&self) -> TimeoutPolicy {
        self.policy
    }

    pub fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    /// Build the timeout error for this context
    pub fn timeout_error(&self) -> SyncError {
        SyncError::timeout(
            self.resource_type,
            self.elapsed(),
            self.policy.duration().unwrap_or(Duration::MAX),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timeout_policy_defaults() {
        assert_eq!(TimeoutPolicy::default_lock(), TimeoutPolicy::Lock(Duration::from_secs(3)));
        assert_eq!(TimeoutPolicy::default_queue(), TimeoutPolicy::Queue(Duration::from_secs(10)));
        assert_eq!(TimeoutPolicy::default(), TimeoutPolicy::None);
    }

    #[test]
    fn test_timeout_policy_expiration() {
        let policy = TimeoutPolicy::Lock(Duration::from_millis(10));
        let start = Instant::now();

        assert!(!policy.is_expired(start));

        thread::sleep(Duration::from_millis(15));
        assert!(policy.is_expired(start));
        assert_eq!(policy.remaining(start), Some(Duration::ZERO));
    }

    #[test]
    fn test_unbounded_policy_never_expires() {
        let start = Instant::now();
        assert!(!TimeoutPolicy::None.is_expired(start));
        assert_eq!(TimeoutPolicy::None.remaining(start), None);
        assert_eq!(TimeoutPolicy::None.deadline(start), None);
        assert_eq!(TimeoutPolicy::Custom(Duration::MAX).deadline(start), None);
    }

    #[test]
    fn test_timeout_config() {
        let config = TimeoutConfig::new()
            .with_lock_timeout(Duration::from_millis(100))
            .with_queue_timeout(Duration::from_secs(5));

        assert_eq!(config.lock_timeout(), TimeoutPolicy::Lock(Duration::from_millis(100)));
        assert_eq!(config.queue_timeout(), TimeoutPolicy::Queue(Duration::from_secs(5)));
    }

    #[test]
    fn test_timeout_config_disabled() {
        let config = TimeoutConfig::disabled();
        assert_eq!(config.lock_timeout(), TimeoutPolicy::None);
        assert_eq!(config.signal_timeout(), TimeoutPolicy::None);
    }

    #[test]
    fn test_timeout_context_error() {
        let ctx = TimeoutContext::new(TimeoutPolicy::Lock(Duration::from_millis(50)), "scoped_lock");
        assert!(!ctx.is_expired());

        match ctx.timeout_error() {
            SyncError::Timeout { resource, timeout_ms, .. } => {
                assert_eq!(resource, "scoped_lock");
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
