//! instruments registry library entry.
//!
//! This crate wires the core aggregators into a process-level metrics
//! registry: lazy label-keyed entries, work timing, tokio-scheduled EWMA
//! ticks with explicit cancellation, and best-effort statsd forwarding.

pub mod config;
pub mod gauge;
pub mod registry;
mod schedule;
pub mod sink;
pub mod timing;
pub mod work;

pub use gauge::RunningGauge;
pub use registry::{MetricsRegistry, ERROR_SUFFIX};
pub use sink::{DatagramTransport, Delivery, Sink, StatsdSink, UdpTransport};
pub use timing::{Completion, TimedCallback};
pub use work::{RecordWork, Work};
