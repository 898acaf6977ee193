/*!
 * Guard Traits
 *
 * Core abstraction shared by all RAII holds
 */

use super::GuardMetadata;
use std::time::Duration;

/// Core guard trait
///
/// There is deliberately no `release` method: a hold ends when the guard
/// is dropped, either at scope exit or through an explicit `drop(guard)`.
pub trait Guard {
    /// Resource type name for logging/debugging
    fn resource_type(&self) -> &'static str;

    /// Get guard metadata
    fn metadata(&self) -> &GuardMetadata;

    /// How long this hold has been active
    fn held_for(&self) -> Duration {
        self.metadata().held_for()
    }
}
