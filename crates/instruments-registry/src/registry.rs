//! Label-keyed store of every work, event, and gauge metric.
//!
//! Entries are created lazily on first touch and owned exclusively here,
//! including the tick task of every meter they contain. Queries read the
//! aggregators and never fail: an unseen label answers with the zero shape.
//! Every record call forwards to the active sink after the in-memory update
//! has completed.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

use instruments_core::error::{InstrumentsError, Result, SinkError};
use instruments_core::pattern::{filter_labels, DottedWildcard, LabelMatcher};
use instruments_core::snapshot::{EventSnapshot, GaugeSnapshot, MetricsSnapshot, WorkSnapshot};
use instruments_core::stats::{Counter, Meter, Timer, TimerSettings, PERCENTILE_FRACTIONS};

use crate::config::InstrumentsConfig;
use crate::schedule::{now, TickHandle};
use crate::sink::{DatagramTransport, Delivery, Sink, StatsdSink, UdpTransport};
use crate::timing::TimedCallback;
use crate::work::{InFlight, Work};

const SINK_ERROR_CAPACITY: usize = 64;
const DEFAULT_SINK_HOST: &str = "127.0.0.1";

/// Suffix of the counter forwarded when work stops with an error.
pub const ERROR_SUFFIX: &str = "__error";

struct WorkEntry {
    active: Counter,
    timer: Timer,
    error_meter: Arc<Meter>,
    ticks: [TickHandle; 2],
}

impl WorkEntry {
    fn cancel_ticks(&mut self) {
        for t in &mut self.ticks {
            t.cancel();
        }
    }
}

struct EventEntry {
    meter: Arc<Meter>,
    tick: TickHandle,
}

struct RegistryInner {
    work: DashMap<String, WorkEntry>,
    events: DashMap<String, EventEntry>,
    gauges: DashMap<String, f64>,
    sink: RwLock<Arc<Sink>>,
    sink_errors: broadcast::Sender<SinkError>,
    matcher: Arc<dyn LabelMatcher>,
    runtime: Handle,
    timer_settings: TimerSettings,
    tick_interval: Duration,
    live_ticks: Arc<AtomicUsize>,
}

/// Cheap to clone; all clones share the same metrics.
#[derive(Clone)]
pub struct MetricsRegistry {
    inner: Arc<RegistryInner>,
}

impl MetricsRegistry {
    /// Registry with default settings and forwarding disabled.
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        Self::from_config(&InstrumentsConfig::default())
    }

    /// Build from config and install the configured sink.
    pub fn from_config(cfg: &InstrumentsConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| InstrumentsError::NoRuntime)?;
        Self::with_runtime(runtime, cfg, Arc::new(DottedWildcard))
    }

    /// Build on an explicit runtime handle with a custom label matcher.
    pub fn with_runtime(
        runtime: Handle,
        cfg: &InstrumentsConfig,
        matcher: Arc<dyn LabelMatcher>,
    ) -> Result<Self> {
        cfg.validate()?;
        let (sink_errors, _) = broadcast::channel(SINK_ERROR_CAPACITY);
        let registry = Self {
            inner: Arc::new(RegistryInner {
                work: DashMap::new(),
                events: DashMap::new(),
                gauges: DashMap::new(),
                sink: RwLock::new(Arc::new(Sink::Null)),
                sink_errors,
                matcher,
                runtime,
                timer_settings: cfg.timer_settings(),
                tick_interval: cfg.tick_interval(),
                live_ticks: Arc::new(AtomicUsize::new(0)),
            }),
        };
        if let Some(sink) = &cfg.sink {
            registry.configure_sink(Some(sink.port), Some(&sink.host))?;
        }
        Ok(registry)
    }

    // --------------------
    // Sink
    // --------------------

    /// Swap the forwarding target. `None` disables forwarding.
    ///
    /// The previous sink is closed before the new one becomes active.
    /// A host name (not an IP literal) is resolved synchronously, so prefer
    /// IP literals or call this from `spawn_blocking` when on a runtime thread.
    pub fn configure_sink(&self, port: Option<u16>, host: Option<&str>) -> Result<Arc<Sink>> {
        let sink = match port {
            None => Sink::Null,
            Some(port) => {
                let host = host.unwrap_or(DEFAULT_SINK_HOST);
                let transport = UdpTransport::bind(host, port, &self.inner.runtime)
                    .map_err(|e| InstrumentsError::Sink(format!("{host}:{port}: {e}")))?;
                self.statsd(Arc::new(transport))
            }
        };
        Ok(self.replace_sink(sink))
    }

    /// Forward through a caller-supplied transport.
    pub fn install_transport(&self, transport: Arc<dyn DatagramTransport>) -> Arc<Sink> {
        let sink = self.statsd(transport);
        self.replace_sink(sink)
    }

    fn statsd(&self, transport: Arc<dyn DatagramTransport>) -> Sink {
        Sink::Statsd(StatsdSink::new(
            transport,
            self.inner.runtime.clone(),
            self.inner.sink_errors.clone(),
        ))
    }

    fn replace_sink(&self, sink: Sink) -> Arc<Sink> {
        let sink = Arc::new(sink);
        let mut slot = self
            .inner
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        slot.close();
        *slot = Arc::clone(&sink);
        match sink.as_ref() {
            Sink::Null => tracing::info!("metric forwarding disabled"),
            Sink::Statsd(s) => tracing::info!(target_addr = %s.target(), "metric forwarding enabled"),
        }
        sink
    }

    /// The active sink.
    pub fn sink(&self) -> Arc<Sink> {
        Arc::clone(
            &self
                .inner
                .sink
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Transport failures from every sink this registry installs.
    pub fn sink_errors(&self) -> broadcast::Receiver<SinkError> {
        self.inner.sink_errors.subscribe()
    }

    // --------------------
    // Recording
    // --------------------

    fn ensure_work(&self, label: &str) {
        if self.inner.work.contains_key(label) {
            return;
        }
        self.inner.work.entry(label.to_string()).or_insert_with(|| {
            let at = now();
            let timer = Timer::with_settings(self.inner.timer_settings, at);
            let error_meter = Arc::new(Meter::with_tick_interval(at, self.inner.tick_interval));
            let ticks = [
                self.spawn_tick(Arc::clone(timer.meter())),
                self.spawn_tick(Arc::clone(&error_meter)),
            ];
            tracing::debug!(label, "work metric created");
            WorkEntry {
                active: Counter::new(),
                timer,
                error_meter,
                ticks,
            }
        });
    }

    fn ensure_event(&self, label: &str) {
        if self.inner.events.contains_key(label) {
            return;
        }
        self.inner.events.entry(label.to_string()).or_insert_with(|| {
            let meter = Arc::new(Meter::with_tick_interval(now(), self.inner.tick_interval));
            let tick = self.spawn_tick(Arc::clone(&meter));
            tracing::debug!(label, "event metric created");
            EventEntry { meter, tick }
        });
    }

    fn spawn_tick(&self, meter: Arc<Meter>) -> TickHandle {
        TickHandle::spawn(&self.inner.runtime, meter, &self.inner.live_ticks)
    }

    /// Record a duration directly, without active-count tracking.
    ///
    /// Negative or non-finite durations are dropped with a warning.
    pub fn measure_work(&self, label: &str, duration_ms: f64) -> Delivery {
        if !(duration_ms.is_finite() && duration_ms >= 0.0) {
            tracing::warn!(label, duration_ms, "invalid duration ignored");
            return Delivery::ready();
        }
        self.ensure_work(label);
        if let Some(entry) = self.inner.work.get(label) {
            entry.timer.update(duration_ms, now());
        }
        self.sink().increment_timer(label, duration_ms)
    }

    /// Record one occurrence of an event.
    pub fn record_event(&self, label: &str) -> Delivery {
        self.record_event_by(label, 1)
    }

    /// Record `count` occurrences; 0 counts as 1.
    pub fn record_event_by(&self, label: &str, count: u64) -> Delivery {
        let count = count.max(1);
        self.ensure_event(label);
        if let Some(entry) = self.inner.events.get(label) {
            entry.meter.mark(count);
        }
        self.sink().increment_counter(label, count)
    }

    pub fn set_gauge(&self, label: &str, value: f64) -> Delivery {
        self.inner.gauges.insert(label.to_string(), value);
        self.sink().set_gauge(label, value)
    }

    /// A tracked unit of work under `label`. The entry exists from here on.
    pub fn work(&self, label: &str) -> Work {
        Work::new(self, label)
    }

    pub(crate) fn register_work(&self, label: &str) {
        self.ensure_work(label);
    }

    pub(crate) fn work_started(&self, label: &str) -> Result<()> {
        let entry = self
            .inner
            .work
            .get(label)
            .ok_or_else(|| InstrumentsError::UnknownWork(label.to_string()))?;
        entry.active.inc();
        Ok(())
    }

    pub(crate) fn work_abandoned(&self, label: &str) -> Result<()> {
        let entry = self
            .inner
            .work
            .get(label)
            .ok_or_else(|| InstrumentsError::UnknownWork(label.to_string()))?;
        entry.active.dec();
        Ok(())
    }

    pub(crate) fn work_stopped(&self, label: &str, elapsed: Duration, error: bool) -> Result<Delivery> {
        let millis = elapsed.as_secs_f64() * 1000.0;
        {
            let entry = self
                .inner
                .work
                .get(label)
                .ok_or_else(|| InstrumentsError::UnknownWork(label.to_string()))?;
            entry.active.dec();
            entry.timer.update(millis, now());
            if error {
                entry.error_meter.mark(1);
            }
        }

        let sink = self.sink();
        let delivery = if error {
            sink.increment_counter(&format!("{label}{ERROR_SUFFIX}"), 1)
        } else {
            sink.increment_timer(label, millis)
        };
        Ok(delivery)
    }

    /// Wrap a completion-style operation so each invocation is timed.
    pub fn time_callback<F>(&self, label: &str, handler: F) -> TimedCallback<F> {
        TimedCallback::new(self.clone(), label, handler)
    }

    /// Time a future from first poll to completion.
    ///
    /// Instrumentation failures (the entry released mid-flight) are logged;
    /// the future's output is always returned. Dropping the returned future
    /// before it completes abandons the work: the active count is released
    /// and no sample is recorded.
    pub async fn time_future<Fut: Future>(&self, label: &str, fut: Fut) -> Fut::Output {
        let mut guard = InFlight(self.work(label));
        if let Err(e) = guard.0.start() {
            tracing::warn!(label, error = %e, "timed future not recorded");
        }
        let out = fut.await;
        if guard.0.is_started() {
            if let Err(e) = guard.0.stop(false) {
                tracing::warn!(label, error = %e, "timed future not recorded");
            }
        }
        out
    }

    // --------------------
    // Queries
    // --------------------

    pub fn has_work_metric(&self, label: &str) -> bool {
        self.inner.work.contains_key(label)
    }

    pub fn has_event_metric(&self, label: &str) -> bool {
        self.inner.events.contains_key(label)
    }

    pub fn has_gauge_metric(&self, label: &str) -> bool {
        self.inner.gauges.contains_key(label)
    }

    pub fn get_work_metric(&self, label: &str) -> WorkSnapshot {
        match self.inner.work.get(label) {
            Some(entry) => work_snapshot(label, &entry, now()),
            None => WorkSnapshot::empty(label),
        }
    }

    pub fn get_event_metric(&self, label: &str) -> EventSnapshot {
        match self.inner.events.get(label) {
            Some(entry) => event_snapshot(label, &entry.meter, now()),
            None => EventSnapshot::empty(label),
        }
    }

    pub fn get_gauge_metric(&self, label: &str) -> GaugeSnapshot {
        match self.inner.gauges.get(label) {
            Some(v) => GaugeSnapshot {
                label: label.to_string(),
                value: *v,
            },
            None => GaugeSnapshot::empty(label),
        }
    }

    /// Snapshots in map iteration order (unsorted).
    pub fn get_work_metrics(&self) -> Vec<WorkSnapshot> {
        let at = now();
        self.inner
            .work
            .iter()
            .map(|r| work_snapshot(r.key(), r.value(), at))
            .collect()
    }

    pub fn get_event_metrics(&self) -> Vec<EventSnapshot> {
        let at = now();
        self.inner
            .events
            .iter()
            .map(|r| event_snapshot(r.key(), &r.value().meter, at))
            .collect()
    }

    pub fn get_gauge_metrics(&self) -> Vec<GaugeSnapshot> {
        self.inner
            .gauges
            .iter()
            .map(|r| GaugeSnapshot {
                label: r.key().clone(),
                value: *r.value(),
            })
            .collect()
    }

    /// Every category at once. Prefer the targeted getters when possible.
    pub fn get_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            work: self.get_work_metrics(),
            events: self.get_event_metrics(),
            gauges: self.get_gauge_metrics(),
        }
    }

    pub fn find_work_metrics(&self, pattern: &str) -> Vec<String> {
        let labels: Vec<String> = self.inner.work.iter().map(|r| r.key().clone()).collect();
        self.find(pattern, &labels)
    }

    pub fn find_event_metrics(&self, pattern: &str) -> Vec<String> {
        let labels: Vec<String> = self.inner.events.iter().map(|r| r.key().clone()).collect();
        self.find(pattern, &labels)
    }

    pub fn find_gauge_metrics(&self, pattern: &str) -> Vec<String> {
        let labels: Vec<String> = self.inner.gauges.iter().map(|r| r.key().clone()).collect();
        self.find(pattern, &labels)
    }

    fn find(&self, pattern: &str, labels: &[String]) -> Vec<String> {
        filter_labels(
            self.inner.matcher.as_ref(),
            pattern,
            labels.iter().map(String::as_str),
        )
    }

    /// Number of meter tick tasks currently scheduled.
    pub fn active_ticks(&self) -> usize {
        self.inner.live_ticks.load(Ordering::Relaxed)
    }

    // --------------------
    // Release / shutdown
    // --------------------

    /// Drop a work entry and cancel its tick tasks. Returns whether it existed.
    pub fn release_work(&self, label: &str) -> bool {
        match self.inner.work.remove(label) {
            Some((_, mut entry)) => {
                entry.cancel_ticks();
                tracing::debug!(label, "work metric released");
                true
            }
            None => false,
        }
    }

    pub fn release_event(&self, label: &str) -> bool {
        match self.inner.events.remove(label) {
            Some((_, mut entry)) => {
                entry.tick.cancel();
                tracing::debug!(label, "event metric released");
                true
            }
            None => false,
        }
    }

    pub fn release_gauge(&self, label: &str) -> bool {
        self.inner.gauges.remove(label).is_some()
    }

    /// Release everything and disable forwarding. Safe to repeat.
    pub fn shutdown(&self) {
        let work: Vec<String> = self.inner.work.iter().map(|r| r.key().clone()).collect();
        for label in &work {
            self.release_work(label);
        }
        let events: Vec<String> = self.inner.events.iter().map(|r| r.key().clone()).collect();
        for label in &events {
            self.release_event(label);
        }
        let gauges: Vec<String> = self.inner.gauges.iter().map(|r| r.key().clone()).collect();
        for label in &gauges {
            self.release_gauge(label);
        }

        self.replace_sink(Sink::Null);
        tracing::info!(
            work = work.len(),
            events = events.len(),
            gauges = gauges.len(),
            "metrics registry shut down"
        );
    }

    /// `shutdown`, then run `done`.
    pub fn shutdown_then<F: FnOnce()>(&self, done: F) {
        self.shutdown();
        done();
    }
}

fn work_snapshot(label: &str, entry: &WorkEntry, at: std::time::Instant) -> WorkSnapshot {
    let timer = &entry.timer;
    let pct = timer.percentiles(&PERCENTILE_FRACTIONS);
    let p = |i: usize| pct.get(i).copied().unwrap_or(0.0);
    WorkSnapshot {
        label: label.to_string(),
        ops_count: timer.count(),
        rate_1m: timer.one_minute_rate(),
        rate_5m: timer.five_minute_rate(),
        rate_15m: timer.fifteen_minute_rate(),
        mean_rate: timer.mean_rate(at),
        min: timer.min(),
        max: timer.max(),
        mean_time: timer.mean(),
        std_dev: timer.std_dev(),
        pct_1: p(0),
        pct_25: p(1),
        pct_50: p(2),
        pct_75: p(3),
        pct_99: p(4),
        pct_999: p(5),
        active: entry.active.value(),
        errors: entry.error_meter.count(),
        err_rate_1m: entry.error_meter.one_minute_rate(),
        err_rate_5m: entry.error_meter.five_minute_rate(),
        err_rate_15m: entry.error_meter.fifteen_minute_rate(),
        err_mean_rate: entry.error_meter.mean_rate(at),
    }
}

fn event_snapshot(label: &str, meter: &Meter, at: std::time::Instant) -> EventSnapshot {
    EventSnapshot {
        label: label.to_string(),
        count: meter.count(),
        rate_1m: meter.one_minute_rate(),
        rate_5m: meter.five_minute_rate(),
        rate_15m: meter.fifteen_minute_rate(),
        rate_mean: meter.mean_rate(at),
    }
}
