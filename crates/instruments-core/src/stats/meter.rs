//! Event-rate tracking with 1/5/15 minute exponentially weighted averages.
//!
//! The windowed rates only move when `tick` is called, which the registry
//! does on a fixed cadence from a background task. Until the first tick they
//! read as 0. `mean_rate` is exact at all times.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::lock;

/// Default cadence of EWMA recomputation.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

const WINDOWS: [Duration; 3] = [
    Duration::from_secs(60),
    Duration::from_secs(5 * 60),
    Duration::from_secs(15 * 60),
];

#[derive(Debug, Clone, Copy)]
struct Ewma {
    alpha: f64,
    /// Events per second.
    rate: f64,
}

impl Ewma {
    fn new(window: Duration, tick: Duration) -> Self {
        Self {
            alpha: 1.0 - (-tick.as_secs_f64() / window.as_secs_f64()).exp(),
            rate: 0.0,
        }
    }

    fn update(&mut self, instant_rate: f64) {
        self.rate += self.alpha * (instant_rate - self.rate);
    }
}

#[derive(Debug)]
pub struct Meter {
    created_at: Instant,
    tick_interval: Duration,
    count: AtomicU64,
    /// Marks since the previous tick.
    uncounted: AtomicU64,
    rates: Mutex<[Ewma; 3]>,
}

impl Meter {
    pub fn new(created_at: Instant) -> Self {
        Self::with_tick_interval(created_at, DEFAULT_TICK_INTERVAL)
    }

    pub fn with_tick_interval(created_at: Instant, tick_interval: Duration) -> Self {
        // tick() divides by the interval
        let tick_interval = tick_interval.max(Duration::from_millis(1));
        Self {
            created_at,
            tick_interval,
            count: AtomicU64::new(0),
            uncounted: AtomicU64::new(0),
            rates: Mutex::new(WINDOWS.map(|w| Ewma::new(w, tick_interval))),
        }
    }

    pub fn mark(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Fold the marks accumulated since the last tick into every window.
    pub fn tick(&self) {
        let n = self.uncounted.swap(0, Ordering::Relaxed);
        let instant_rate = n as f64 / self.tick_interval.as_secs_f64();
        for ewma in lock(&self.rates).iter_mut() {
            ewma.update(instant_rate);
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn one_minute_rate(&self) -> f64 {
        lock(&self.rates)[0].rate
    }

    pub fn five_minute_rate(&self) -> f64 {
        lock(&self.rates)[1].rate
    }

    pub fn fifteen_minute_rate(&self) -> f64 {
        lock(&self.rates)[2].rate
    }

    /// Events per second since creation; 0 at the creation instant.
    pub fn mean_rate(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.created_at).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.count() as f64 / elapsed
    }
}
