use crate::registry::MetricsRegistry;

/// A running count published as a gauge after every change.
pub struct RunningGauge {
    registry: MetricsRegistry,
    label: String,
    starting: f64,
    count: f64,
}

impl RunningGauge {
    /// Publishes the starting value (0 when absent) immediately.
    pub fn new(registry: &MetricsRegistry, label: &str, starting: Option<f64>) -> Self {
        let starting = starting.unwrap_or(0.0);
        let gauge = Self {
            registry: registry.clone(),
            label: label.to_string(),
            starting,
            count: starting,
        };
        gauge.publish();
        gauge
    }

    pub fn value(&self) -> f64 {
        self.count
    }

    pub fn incr(&mut self, by: Option<f64>) {
        self.count += by.unwrap_or(1.0);
        self.publish();
    }

    pub fn decr(&mut self, by: Option<f64>) {
        self.count -= by.unwrap_or(1.0);
        self.publish();
    }

    /// Reset to `to`, or to the starting value when `to` is absent or zero.
    pub fn reset(&mut self, to: Option<f64>) {
        self.count = match to {
            Some(v) if v != 0.0 => v,
            _ => self.starting,
        };
        self.publish();
    }

    fn publish(&self) {
        self.registry.set_gauge(&self.label, self.count);
    }
}
