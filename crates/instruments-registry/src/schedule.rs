//! Background EWMA ticking.
//!
//! Every meter the registry creates gets one tick task. The registry keeps
//! the `TickHandle` next to the meter and aborts it on release, so no
//! recurring task outlives its entry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use instruments_core::stats::Meter;

/// Current time on the tokio clock (honours paused time in tests).
pub(crate) fn now() -> std::time::Instant {
    Instant::now().into_std()
}

pub(crate) struct TickHandle {
    task: Option<JoinHandle<()>>,
    live: Arc<AtomicUsize>,
}

impl TickHandle {
    pub(crate) fn spawn(runtime: &Handle, meter: Arc<Meter>, live: &Arc<AtomicUsize>) -> Self {
        let period = meter.tick_interval();
        let task = runtime.spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                meter.tick();
            }
        });
        live.fetch_add(1, Ordering::Relaxed);
        Self {
            task: Some(task),
            live: Arc::clone(live),
        }
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.live.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
