/*!
 * Synchronization Configuration
 *
 * Runtime tuning for spin escalation, default timeouts and queue sizing.
 *
 * ## Environment
 *
 * | Variable                          | Effect                                  |
 * |-----------------------------------|-----------------------------------------|
 * | `SYNC_TOOLKIT_LOCK_TIMEOUT_MS`    | default lock timeout                    |
 * | `SYNC_TOOLKIT_QUEUE_TIMEOUT_MS`   | default queue put/take timeout          |
 * | `SYNC_TOOLKIT_SIGNAL_TIMEOUT_MS`  | default signal wait timeout             |
 * | `SYNC_TOOLKIT_SPIN_PROFILE`       | `low_latency`, `long_wait` or `default` |
 * | `SYNC_TOOLKIT_QUEUE_CAPACITY`     | default bounded queue capacity          |
 *
 * Unparseable values are logged and ignored.
 */

use super::spinwait::EscalationPolicy;
use crate::core::guard::TimeoutConfig;
use std::time::Duration;
use tracing::warn;

pub const LOCK_TIMEOUT_ENV: &str = "SYNC_TOOLKIT_LOCK_TIMEOUT_MS";
pub const QUEUE_TIMEOUT_ENV: &str = "SYNC_TOOLKIT_QUEUE_TIMEOUT_MS";
pub const SIGNAL_TIMEOUT_ENV: &str = "SYNC_TOOLKIT_SIGNAL_TIMEOUT_MS";
pub const SPIN_PROFILE_ENV: &str = "SYNC_TOOLKIT_SPIN_PROFILE";
pub const QUEUE_CAPACITY_ENV: &str = "SYNC_TOOLKIT_QUEUE_CAPACITY";

/// Capacity of the dish rack in the producer/consumer demo
const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Synchronization configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backoff used by spin barriers and CAS retry loops
    pub escalation: EscalationPolicy,
    /// Per-category default timeouts
    pub timeouts: TimeoutConfig,
    /// Capacity for queues created without an explicit size
    pub queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            escalation: EscalationPolicy::default(),
            timeouts: TimeoutConfig::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Configuration optimized for low-latency (< 1ms wait expected)
    pub fn low_latency() -> Self {
        Self {
            escalation: EscalationPolicy::low_latency(),
            ..Self::default()
        }
    }

    /// Configuration optimized for long waits (> 1ms expected)
    pub fn long_wait() -> Self {
        Self {
            escalation: EscalationPolicy::long_wait(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `SYNC_TOOLKIT_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(SPIN_PROFILE_ENV).as_deref() {
            None | Some("default") => Self::default(),
            Some("low_latency") => Self::low_latency(),
            Some("long_wait") => Self::long_wait(),
            Some(other) => {
                warn!(variable = SPIN_PROFILE_ENV, value = other, "unknown spin profile, using default");
                Self::default()
            }
        };

        if let Some(ms) = parse_var::<u64, _>(&lookup, LOCK_TIMEOUT_ENV) {
            config.timeouts = config.timeouts.with_lock_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, QUEUE_TIMEOUT_ENV) {
            config.timeouts = config.timeouts.with_queue_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, SIGNAL_TIMEOUT_ENV) {
            config.timeouts = config.timeouts.with_signal_timeout(Duration::from_millis(ms));
        }
        match parse_var::<usize, _>(&lookup, QUEUE_CAPACITY_ENV) {
            Some(0) => warn!(variable = QUEUE_CAPACITY_ENV, "queue capacity must be positive, ignoring"),
            Some(capacity) => config.queue_capacity = capacity,
            None => {}
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::guard::TimeoutPolicy;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = SyncConfig::from_lookup(|_| None);
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.escalation, EscalationPolicy::default());
        assert_eq!(config.timeouts.lock_timeout(), TimeoutPolicy::default_lock());
    }

    #[test]
    fn test_overrides_applied() {
        let config = SyncConfig::from_lookup(lookup_from(&[
            (LOCK_TIMEOUT_ENV, "50"),
            (QUEUE_TIMEOUT_ENV, " 250 "),
            (SPIN_PROFILE_ENV, "low_latency"),
            (QUEUE_CAPACITY_ENV, "4"),
        ]));

        assert_eq!(config.timeouts.lock_timeout(), TimeoutPolicy::Lock(Duration::from_millis(50)));
        assert_eq!(config.timeouts.queue_timeout(), TimeoutPolicy::Queue(Duration::from_millis(250)));
        assert_eq!(config.escalation, EscalationPolicy::low_latency());
        assert_eq!(config.queue_capacity, 4);
    }

    #[test]
    fn test_invalid_values_ignored() {
        let config = SyncConfig::from_lookup(lookup_from(&[
            (LOCK_TIMEOUT_ENV, "soon"),
            (SPIN_PROFILE_ENV, "turbo"),
            (QUEUE_CAPACITY_ENV, "0"),
        ]));

        assert_eq!(config.timeouts.lock_timeout(), TimeoutPolicy::default_lock());
        assert_eq!(config.escalation, EscalationPolicy::default());
        assert_eq!(config.queue_capacity, 10);
    }
}
