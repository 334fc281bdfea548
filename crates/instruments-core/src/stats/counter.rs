use std::sync::atomic::{AtomicI64, Ordering};

/// Integer accumulator used for in-flight (active) work.
///
/// Never negative for correct callers; not enforced.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1.
    pub fn inc(&self) {
        self.add(1);
    }

    /// Decrement by 1.
    pub fn dec(&self) {
        self.add(-1);
    }

    /// Add an arbitrary signed delta.
    pub fn add(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn value(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
    }
}
