//! Forward-decaying priority sample.
//!
//! Each value gets priority `exp(alpha * (t - t0)) / u` with `u` uniform in
//! (0, 1]; the sample keeps the `capacity` highest priorities, so recent
//! values are favoured. Priorities are periodically rescaled to a new `t0` so
//! the exponent stays finite in long-running processes.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Largest `alpha * age` a priority may carry. `exp` overflows past ~709.
pub const MAX_PRIORITY_EXPONENT: f64 = 700.0;

#[derive(Debug, Clone, Copy)]
struct Sample {
    priority: f64,
    value: f64,
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Sample {}

impl PartialOrd for Sample {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sample {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.total_cmp(&other.priority)
    }
}

#[derive(Debug)]
pub struct DecayingReservoir {
    capacity: usize,
    alpha: f64,
    rescale_interval: Duration,
    landmark: Instant,
    next_rescale: Instant,
    // min-heap on priority: the root is the next eviction candidate
    samples: BinaryHeap<Reverse<Sample>>,
    rng: StdRng,
}

impl DecayingReservoir {
    pub fn new(capacity: usize, alpha: f64, rescale_interval: Duration, now: Instant) -> Self {
        Self::with_rng(capacity, alpha, rescale_interval, now, StdRng::from_entropy())
    }

    /// Deterministic variant for reproducible sampling.
    pub fn seeded(
        capacity: usize,
        alpha: f64,
        rescale_interval: Duration,
        now: Instant,
        seed: u64,
    ) -> Self {
        Self::with_rng(capacity, alpha, rescale_interval, now, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        capacity: usize,
        alpha: f64,
        rescale_interval: Duration,
        now: Instant,
        rng: StdRng,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            alpha,
            rescale_interval,
            landmark: now,
            next_rescale: now + rescale_interval,
            samples: BinaryHeap::with_capacity(capacity),
            rng,
        }
    }

    pub fn update(&mut self, value: f64, now: Instant) {
        if now >= self.next_rescale || self.exponent(now) >= MAX_PRIORITY_EXPONENT {
            self.rescale(now);
        }

        // gen() is [0, 1); flip it so the divisor is never zero
        let u = 1.0 - self.rng.gen::<f64>();
        let priority = self.exponent(now).exp() / u;
        let sample = Sample { priority, value };

        if self.samples.len() < self.capacity {
            self.samples.push(Reverse(sample));
            return;
        }

        let evict = matches!(self.samples.peek(), Some(Reverse(lowest)) if priority > lowest.priority);
        if evict {
            self.samples.pop();
            self.samples.push(Reverse(sample));
        }
    }

    fn exponent(&self, now: Instant) -> f64 {
        self.alpha * now.saturating_duration_since(self.landmark).as_secs_f64()
    }

    fn rescale(&mut self, now: Instant) {
        // underflows to 0 after a long idle gap, so every old sample is evictable
        let factor = (-self.exponent(now)).exp();
        self.landmark = now;
        self.next_rescale = now + self.rescale_interval;

        let rescaled: BinaryHeap<_> = std::mem::take(&mut self.samples)
            .into_iter()
            .map(|Reverse(s)| {
                Reverse(Sample {
                    priority: s.priority * factor,
                    value: s.value,
                })
            })
            .collect();
        self.samples = rescaled;
        tracing::trace!(size = self.samples.len(), "reservoir rescaled");
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stored values, sorted ascending.
    pub fn sorted_values(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self.samples.iter().map(|Reverse(s)| s.value).collect();
        values.sort_by(f64::total_cmp);
        values
    }

    /// Value at rank `ceil(f * n) - 1` for each fraction; all zeros when empty.
    pub fn percentiles(&self, fractions: &[f64]) -> Vec<f64> {
        let values = self.sorted_values();
        if values.is_empty() {
            return vec![0.0; fractions.len()];
        }
        let last = values.len() - 1;
        fractions
            .iter()
            .map(|f| {
                let rank = (f * values.len() as f64).ceil() as usize;
                values[rank.saturating_sub(1).min(last)]
            })
            .collect()
    }
}
