//! Entity model for the task hierarchy.
//!
//! # Responsibility
//! - Define the tagged union of todo variants and the values they reference.
//! - Provide copy-with-changes helpers so published snapshots stay immutable.
//!
//! # Invariants
//! - Every todo is identified by a stable, non-nil `TodoId`.
//! - Deletion is a soft-delete flag, never a physical removal.
//! - Variant-specific fields live only on their variant struct.

pub mod todo;
pub mod user;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds per day, used for due-date arithmetic.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Current wall-clock time as Unix epoch milliseconds.
///
/// Clocks set before the epoch read as `0`.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
