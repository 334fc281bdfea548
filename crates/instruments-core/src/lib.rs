//! instruments core: runtime-free aggregation primitives, snapshot shapes, and errors.
//!
//! This crate holds the statistics (counters, EWMA meters, timers with a
//! decaying reservoir), the label matcher, and the statsd line encoder. It
//! carries no runtime or transport dependencies: every time-dependent call
//! takes an explicit `Instant`, so the same primitives drive the tokio-backed
//! registry and deterministic tests.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Queries must never
//! fail, so a poisoned lock is recovered rather than propagated.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod pattern;
pub mod profile;
pub mod snapshot;
pub mod stats;
pub mod wire;

/// Shared result type.
pub use error::{ErrorKind, InstrumentsError, Result, SinkError};
pub use pattern::{filter_labels, DottedWildcard, LabelMatcher};
pub use snapshot::{EventSnapshot, GaugeSnapshot, MetricsSnapshot, WorkSnapshot};
pub use stats::{Counter, Meter, Timer, TimerSettings};
