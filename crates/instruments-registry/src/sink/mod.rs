//! Best-effort forwarding of every update to an external statsd collector.
//!
//! Forwarding is selected explicitly: `Sink::Null` drops everything and
//! completes immediately, `Sink::Statsd` sends one datagram per update.

mod statsd;
mod transport;

use tokio::sync::oneshot;

use instruments_core::error::SinkError;

pub use statsd::StatsdSink;
pub use transport::{DatagramTransport, UdpTransport};

pub enum Sink {
    Null,
    Statsd(StatsdSink),
}

impl Sink {
    pub fn is_null(&self) -> bool {
        matches!(self, Sink::Null)
    }

    pub fn increment_counter(&self, label: &str, count: u64) -> Delivery {
        match self {
            Sink::Null => Delivery::ready(),
            Sink::Statsd(s) => s.increment_counter(label, count),
        }
    }

    pub fn increment_timer(&self, label: &str, millis: f64) -> Delivery {
        match self {
            Sink::Null => Delivery::ready(),
            Sink::Statsd(s) => s.increment_timer(label, millis),
        }
    }

    pub fn set_gauge(&self, label: &str, value: f64) -> Delivery {
        match self {
            Sink::Null => Delivery::ready(),
            Sink::Statsd(s) => s.set_gauge(label, value),
        }
    }

    pub fn close(&self) {
        if let Sink::Statsd(s) = self {
            s.close();
        }
    }
}

/// Outcome of one forwarded update.
///
/// Dropping it is the fire-and-forget path; awaiting `wait` observes the
/// transport result without affecting the already-recorded metric.
pub struct Delivery {
    pending: Option<(String, oneshot::Receiver<Result<(), SinkError>>)>,
}

impl Delivery {
    pub(crate) fn ready() -> Self {
        Self { pending: None }
    }

    pub(crate) fn pending(label: &str, rx: oneshot::Receiver<Result<(), SinkError>>) -> Self {
        Self {
            pending: Some((label.to_string(), rx)),
        }
    }

    pub async fn wait(self) -> Result<(), SinkError> {
        match self.pending {
            None => Ok(()),
            Some((label, rx)) => rx
                .await
                .unwrap_or_else(|_| Err(SinkError::new(label, "send task dropped"))),
        }
    }
}
