use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};

use instruments_core::error::SinkError;
use instruments_core::wire;

use super::transport::DatagramTransport;
use super::Delivery;

/// Fire-and-forget statsd client.
///
/// Each call encodes one line and hands it to a spawned send task; the
/// caller never waits on the network. Failures go to the `Delivery`, the
/// shared error channel, and the log.
pub struct StatsdSink {
    transport: Arc<dyn DatagramTransport>,
    runtime: Handle,
    errors: broadcast::Sender<SinkError>,
    closed: AtomicBool,
}

impl StatsdSink {
    pub fn new(
        transport: Arc<dyn DatagramTransport>,
        runtime: Handle,
        errors: broadcast::Sender<SinkError>,
    ) -> Self {
        Self {
            transport,
            runtime,
            errors,
            closed: AtomicBool::new(false),
        }
    }

    pub fn target(&self) -> String {
        self.transport.target()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn increment_counter(&self, label: &str, count: u64) -> Delivery {
        self.send(label, wire::counter(label, count))
    }

    pub fn increment_timer(&self, label: &str, millis: f64) -> Delivery {
        self.send(label, wire::timer(label, millis))
    }

    pub fn set_gauge(&self, label: &str, value: f64) -> Delivery {
        self.send(label, wire::gauge(label, value))
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.transport.close();
            tracing::info!(target_addr = %self.transport.target(), "statsd sink closed");
        }
    }

    fn send(&self, label: &str, datagram: Bytes) -> Delivery {
        let (tx, rx) = oneshot::channel();
        let delivery = Delivery::pending(label, rx);

        if self.is_closed() {
            let err = SinkError::new(label, "sink closed");
            report(&self.errors, &err);
            let _ = tx.send(Err(err));
            return delivery;
        }

        let transport = Arc::clone(&self.transport);
        let errors = self.errors.clone();
        let label = label.to_string();
        self.runtime.spawn(async move {
            let res = transport
                .send(datagram)
                .await
                .map_err(|e| SinkError::new(label, e.to_string()));
            if let Err(err) = &res {
                report(&errors, err);
            }
            let _ = tx.send(res);
        });
        delivery
    }
}

fn report(errors: &broadcast::Sender<SinkError>, err: &SinkError) {
    tracing::warn!(label = %err.label, error = %err.message, "statsd send failed");
    // no subscribers is fine
    let _ = errors.send(err.clone());
}
