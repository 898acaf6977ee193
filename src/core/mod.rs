/*!
 * Core Module
 * Synchronization primitives, guards and error handling
 */

pub mod errors;
pub mod guard;
pub mod sync;

// Re-export for convenience
pub use errors::*;
pub use guard::{Guard, GuardMetadata, TimeoutConfig, TimeoutContext, TimeoutPolicy};
