/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by every blocking primitive in the toolkit
///
/// Nothing here is retried internally; the caller decides whether to retry,
/// abort, or degrade.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Timed out waiting for {resource} after {elapsed_ms}ms (limit {timeout_ms}ms)")]
    #[diagnostic(
        code(sync::timeout),
        help("The resource stayed unavailable for the whole wait. Retry, back off, or abort the higher-level operation.")
    )]
    Timeout {
        resource: String,
        elapsed_ms: u64,
        timeout_ms: u64,
    },

    #[error("Re-entrant acquisition of {resource} by the thread already holding it")]
    #[diagnostic(
        code(sync::reentrancy),
        help("Locks are non-reentrant. Drop the existing guard before acquiring again, or restructure the call path.")
    )]
    Reentrancy { resource: String },

    #[error("Operation on {resource} was cancelled")]
    #[diagnostic(
        code(sync::cancelled),
        help("The operation was not performed. Treat it as never attempted.")
    )]
    Cancelled { resource: String },

    #[error("{resource} is no longer accepting items")]
    #[diagnostic(
        code(sync::closed),
        help("Adding was completed on this queue. Remaining items can still be taken.")
    )]
    Closed { resource: String },

    #[error("Invalid capacity: {0}")]
    #[diagnostic(code(sync::invalid_capacity), help("Capacity must be greater than zero."))]
    InvalidCapacity(usize),

    #[error("Semaphore overflow: releasing {requested} permits would exceed the maximum of {max}")]
    #[diagnostic(
        code(sync::semaphore_overflow),
        help("More permits were returned than were ever handed out.")
    )]
    SemaphoreOverflow { requested: usize, max: usize },
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl SyncError {
    /// Create a timeout error for a resource
    pub fn timeout(resource: impl Into<String>, elapsed: Duration, timeout: Duration) -> Self {
        Self::Timeout {
            resource: resource.into(),
            elapsed_ms: saturating_millis(elapsed),
            timeout_ms: saturating_millis(timeout),
        }
    }

    pub fn reentrancy(resource: impl Into<String>) -> Self {
        Self::Reentrancy {
            resource: resource.into(),
        }
    }

    pub fn cancelled(resource: impl Into<String>) -> Self {
        Self::Cancelled {
            resource: resource.into(),
        }
    }

    pub fn closed(resource: impl Into<String>) -> Self {
        Self::Closed {
            resource: resource.into(),
        }
    }

    /// Whether a caller can reasonably retry or carry on
    ///
    /// Reentrancy is a programming error; everything else is an expected
    /// outcome of contention, cancellation, or shutdown.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Reentrancy { .. } | Self::SemaphoreOverflow { .. })
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result type for toolkit operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;
