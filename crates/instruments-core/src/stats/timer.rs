//! Duration aggregation: exact moments, approximate percentiles, throughput.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::lock;
use super::meter::{Meter, DEFAULT_TICK_INTERVAL};
use super::reservoir::DecayingReservoir;

/// Fractions reported by work snapshots (`pct_1` .. `pct_999`).
pub const PERCENTILE_FRACTIONS: [f64; 6] = [0.01, 0.25, 0.5, 0.75, 0.99, 0.999];

#[derive(Debug, Clone, Copy)]
pub struct TimerSettings {
    pub reservoir_size: usize,
    /// Per-second decay bias of the reservoir.
    pub decay_alpha: f64,
    pub rescale_interval: Duration,
    pub tick_interval: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            reservoir_size: 1028,
            decay_alpha: 0.015,
            rescale_interval: Duration::from_secs(60 * 60),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Welford running aggregate.
#[derive(Debug, Default, Clone, Copy)]
struct Moments {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Moments {
    fn update(&mut self, x: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = x;
            self.max = x;
        } else {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn std_dev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).sqrt()
    }
}

#[derive(Debug)]
pub struct Timer {
    moments: Mutex<Moments>,
    reservoir: Mutex<DecayingReservoir>,
    meter: Arc<Meter>,
}

impl Timer {
    pub fn new(now: Instant) -> Self {
        Self::with_settings(TimerSettings::default(), now)
    }

    pub fn with_settings(settings: TimerSettings, now: Instant) -> Self {
        let reservoir = DecayingReservoir::new(
            settings.reservoir_size,
            settings.decay_alpha,
            settings.rescale_interval,
            now,
        );
        Self::from_parts(reservoir, Meter::with_tick_interval(now, settings.tick_interval))
    }

    pub fn from_parts(reservoir: DecayingReservoir, meter: Meter) -> Self {
        Self {
            moments: Mutex::new(Moments::default()),
            reservoir: Mutex::new(reservoir),
            meter: Arc::new(meter),
        }
    }

    /// Record one duration in milliseconds.
    pub fn update(&self, duration_ms: f64, now: Instant) {
        lock(&self.moments).update(duration_ms);
        lock(&self.reservoir).update(duration_ms, now);
        self.meter.mark(1);
    }

    /// Throughput meter; the registry ticks it.
    pub fn meter(&self) -> &Arc<Meter> {
        &self.meter
    }

    pub fn count(&self) -> u64 {
        lock(&self.moments).count
    }

    pub fn min(&self) -> f64 {
        lock(&self.moments).min
    }

    pub fn max(&self) -> f64 {
        lock(&self.moments).max
    }

    pub fn mean(&self) -> f64 {
        lock(&self.moments).mean
    }

    /// Sample standard deviation (divisor `n - 1`), 0 below two samples.
    pub fn std_dev(&self) -> f64 {
        lock(&self.moments).std_dev()
    }

    pub fn percentiles(&self, fractions: &[f64]) -> Vec<f64> {
        lock(&self.reservoir).percentiles(fractions)
    }

    pub fn sample_size(&self) -> usize {
        lock(&self.reservoir).len()
    }

    pub fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    pub fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    pub fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }

    pub fn mean_rate(&self, now: Instant) -> f64 {
        self.meter.mean_rate(now)
    }
}
