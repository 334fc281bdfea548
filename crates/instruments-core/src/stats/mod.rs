//! Aggregation primitives owned by the registry.
//!
//! All types use interior mutability (`&self` updates) so a single instance
//! can be shared between the recording path and its background tick task.

mod counter;
mod meter;
mod reservoir;
mod timer;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use counter::Counter;
pub use meter::{Meter, DEFAULT_TICK_INTERVAL};
pub use reservoir::{DecayingReservoir, MAX_PRIORITY_EXPONENT};
pub use timer::{Timer, TimerSettings, PERCENTILE_FRACTIONS};

/// Lock without propagating poison: a panicked writer leaves plain numbers
/// behind, and queries must keep answering.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
