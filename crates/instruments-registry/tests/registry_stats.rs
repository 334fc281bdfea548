//! Registry recording, queries, discovery, release and shutdown.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use instruments_core::pattern::LabelMatcher;
use instruments_core::snapshot::{EventSnapshot, GaugeSnapshot, MetricsSnapshot, WorkSnapshot};
use instruments_registry::config::InstrumentsConfig;
use instruments_registry::MetricsRegistry;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

#[tokio::test(start_paused = true)]
async fn unseen_labels_answer_zero_shapes() {
    let reg = MetricsRegistry::new().unwrap();
    assert_eq!(reg.get_work_metric("nope"), WorkSnapshot::empty("nope"));
    assert_eq!(reg.get_event_metric("nope"), EventSnapshot::empty("nope"));
    assert_eq!(reg.get_gauge_metric("nope"), GaugeSnapshot::empty("nope"));
    assert_eq!(reg.get_metrics(), MetricsSnapshot::default());
    // queries never materialize entries
    assert!(!reg.has_work_metric("nope"));
    assert!(!reg.has_event_metric("nope"));
    assert!(!reg.has_gauge_metric("nope"));
}

#[tokio::test(start_paused = true)]
async fn identical_durations_and_mean_rate() {
    let reg = MetricsRegistry::new().unwrap();
    for _ in 0..200 {
        reg.measure_work("foo2", 10.0);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let met = reg.get_work_metric("foo2");
    assert_eq!(met.ops_count, 200);
    assert_eq!(met.min, 10.0);
    assert_eq!(met.max, 10.0);
    assert_eq!(met.mean_time, 10.0);
    assert_eq!(met.std_dev, 0.0);
    assert!((met.mean_rate - 100.0).abs() < 6.0, "mean_rate {}", met.mean_rate);
    assert_eq!(met.active, 0);
    assert!(reg.release_work("foo2"));
}

#[tokio::test(start_paused = true)]
async fn distributions_are_exact_for_small_populations() {
    let reg = MetricsRegistry::new().unwrap();
    let data = [
        10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 1.0, 1.0, 1.0, 1.0, 1.0, 100.0,
    ];
    for d in data {
        reg.measure_work("test.distributions", d);
    }

    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let stddev = (data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();

    let met = reg.get_work_metric("test.distributions");
    assert_eq!(met.ops_count, 16);
    assert_eq!(met.min, 1.0);
    assert_eq!(met.max, 100.0);
    assert!(close(met.mean_time, mean));
    assert!(close(met.std_dev, stddev));
    assert_eq!(met.pct_1, 1.0);
    assert_eq!(met.pct_50, 10.0);
    assert_eq!(met.pct_99, 100.0);
    assert_eq!(met.pct_999, 100.0);
}

#[tokio::test(start_paused = true)]
async fn all_work_metrics_are_listed() {
    let reg = MetricsRegistry::new().unwrap();
    reg.measure_work("one", 20.0);
    reg.measure_work("one", 40.0);
    reg.measure_work("two", 60.0);

    let mut all = reg.get_work_metrics();
    all.sort_by(|a, b| a.label.cmp(&b.label));
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].label, "one");
    assert_eq!(all[0].ops_count, 2);
    assert_eq!(all[0].mean_time, 30.0);
    assert_eq!(all[1].label, "two");
    assert_eq!(all[1].ops_count, 1);
}

#[tokio::test(start_paused = true)]
async fn events_count_before_any_tick() {
    let reg = MetricsRegistry::new().unwrap();
    for _ in 0..10 {
        reg.record_event("foo");
    }
    let mut metrics = reg.get_event_metrics();
    assert_eq!(metrics.len(), 1);
    // mean rate depends on elapsed time; windows need a tick
    metrics[0].rate_mean = 0.0;
    assert_eq!(metrics[0], EventSnapshot { count: 10, ..EventSnapshot::empty("foo") });

    reg.record_event_by("foo", 5);
    reg.record_event_by("foo", 0);
    assert_eq!(reg.get_event_metric("foo").count, 16);
    assert!(reg.release_event("foo"));
}

#[tokio::test(start_paused = true)]
async fn windowed_rates_follow_background_ticks() {
    let reg = MetricsRegistry::new().unwrap();
    reg.record_event_by("ticked", 60);
    assert_eq!(reg.get_event_metric("ticked").rate_1m, 0.0);

    tokio::time::sleep(Duration::from_millis(5_001)).await;

    let met = reg.get_event_metric("ticked");
    let alpha = |window: f64| 1.0 - (-5.0 / window).exp();
    assert!(close(met.rate_1m, 12.0 * alpha(60.0)), "{}", met.rate_1m);
    assert!(close(met.rate_5m, 12.0 * alpha(300.0)));
    assert!(close(met.rate_15m, 12.0 * alpha(900.0)));
    assert!(close(met.rate_mean, 60.0 / 5.001));
}

#[tokio::test(start_paused = true)]
async fn work_throughput_rates_tick_too() {
    let reg = MetricsRegistry::new().unwrap();
    for _ in 0..10 {
        reg.measure_work("tp", 1.0);
    }
    tokio::time::sleep(Duration::from_millis(5_001)).await;
    let met = reg.get_work_metric("tp");
    assert!(close(met.rate_1m, 2.0 * (1.0 - (-5.0f64 / 60.0).exp())));
    assert_eq!(met.err_rate_1m, 0.0);
}

#[tokio::test(start_paused = true)]
async fn gauges_set_query_release() {
    let reg = MetricsRegistry::new().unwrap();
    assert_eq!(reg.get_gauge_metrics(), vec![]);

    reg.set_gauge("foo", 12.0);
    assert_eq!(reg.get_gauge_metric("foo"), GaugeSnapshot { label: "foo".into(), value: 12.0 });
    assert_eq!(reg.get_gauge_metrics(), vec![GaugeSnapshot { label: "foo".into(), value: 12.0 }]);
    assert_eq!(
        reg.get_metrics(),
        MetricsSnapshot {
            work: vec![],
            events: vec![],
            gauges: vec![GaugeSnapshot { label: "foo".into(), value: 12.0 }],
        }
    );

    reg.set_gauge("foo", 3.5);
    assert_eq!(reg.get_gauge_metric("foo").value, 3.5);

    assert!(reg.release_gauge("foo"));
    assert_eq!(reg.get_gauge_metric("foo"), GaugeSnapshot::empty("foo"));
    assert!(!reg.release_gauge("foo"));
}

#[tokio::test(start_paused = true)]
async fn find_metrics_by_pattern() {
    let reg = MetricsRegistry::new().unwrap();
    let sorted = |mut v: Vec<String>| {
        v.sort();
        v
    };

    reg.set_gauge("foo.bar.tex", 12.0);
    reg.set_gauge("foo.bike.tex", 13.0);
    assert_eq!(sorted(reg.find_gauge_metrics("foo.*")), vec!["foo.bar.tex", "foo.bike.tex"]);
    assert_eq!(sorted(reg.find_gauge_metrics("foo.*.tex")), vec!["foo.bar.tex", "foo.bike.tex"]);
    assert_eq!(reg.find_gauge_metrics("foo.bar.*"), vec!["foo.bar.tex"]);

    reg.record_event("test.event.1");
    reg.record_event("test.event.2");
    reg.record_event("test.event");
    assert_eq!(reg.find_event_metrics("test.event"), vec!["test.event"]);
    assert_eq!(
        sorted(reg.find_event_metrics("test.event.*")),
        vec!["test.event", "test.event.1", "test.event.2"]
    );

    reg.measure_work("test1.work.1", 10.0);
    reg.measure_work("test2.work.2", 11.0);
    reg.measure_work("test3.work", 7.0);
    assert_eq!(reg.find_work_metrics("*.*.2"), vec!["test2.work.2"]);
    assert_eq!(
        sorted(reg.find_work_metrics("*.work.*")),
        vec!["test1.work.1", "test2.work.2", "test3.work"]
    );
    assert!(reg.find_work_metrics("nothing.*").is_empty());
    reg.shutdown();
}

#[tokio::test(start_paused = true)]
async fn release_cancels_tick_tasks() {
    let reg = MetricsRegistry::new().unwrap();
    reg.measure_work("w", 1.0);
    reg.record_event("e");
    // timer meter + error meter + event meter
    assert_eq!(reg.active_ticks(), 3);

    // releasing an unknown label is a no-op
    assert!(!reg.release_work("missing"));

    assert!(reg.release_work("w"));
    assert_eq!(reg.active_ticks(), 1);
    assert!(reg.release_event("e"));
    assert_eq!(reg.active_ticks(), 0);

    // recreated lazily with fresh state
    reg.measure_work("w", 2.0);
    assert_eq!(reg.get_work_metric("w").ops_count, 1);
    assert_eq!(reg.active_ticks(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_empties_everything_and_repeats() {
    let reg = MetricsRegistry::new().unwrap();
    reg.measure_work("a", 1.0);
    reg.record_event("b");
    reg.set_gauge("c", 1.0);

    let mut called = false;
    reg.shutdown_then(|| called = true);
    assert!(called);
    assert_eq!(reg.get_metrics(), MetricsSnapshot::default());
    assert_eq!(reg.active_ticks(), 0);
    assert!(reg.sink().is_null());

    reg.shutdown();
    assert_eq!(reg.get_metrics(), MetricsSnapshot::default());
}

#[tokio::test(start_paused = true)]
async fn invalid_durations_are_ignored() {
    let reg = MetricsRegistry::new().unwrap();
    for bad in [f64::NAN, f64::INFINITY, -1.0] {
        reg.measure_work("bad", bad).wait().await.unwrap();
    }
    assert!(!reg.has_work_metric("bad"));

    reg.measure_work("bad", 5.0);
    reg.measure_work("bad", f64::NAN);
    let met = reg.get_work_metric("bad");
    assert_eq!(met.ops_count, 1);
    assert_eq!(met.mean_time, 5.0);

    // every numeric field stays a JSON number
    let json = serde_json::to_value(reg.get_metrics()).unwrap();
    let work = json["work"][0].as_object().unwrap();
    assert_eq!(work["label"], "bad");
    for (field, value) in work.iter().filter(|(k, _)| *k != "label") {
        assert!(value.is_number(), "{field} = {value}");
    }
    assert_eq!(work["max"].as_f64(), Some(5.0));
}

#[tokio::test(start_paused = true)]
async fn clones_share_state() {
    let reg = MetricsRegistry::new().unwrap();
    let other = reg.clone();
    other.set_gauge("shared", 9.0);
    assert_eq!(reg.get_gauge_metric("shared").value, 9.0);

    // separate registries are isolated
    let isolated = MetricsRegistry::new().unwrap();
    assert!(!isolated.has_gauge_metric("shared"));
}

#[test]
fn new_requires_a_runtime() {
    let err = MetricsRegistry::new().err().unwrap();
    assert_eq!(err.kind().as_str(), "RUNTIME");
}

struct PrefixMatcher;

impl LabelMatcher for PrefixMatcher {
    fn matches(&self, pattern: &str, label: &str) -> bool {
        label.starts_with(pattern)
    }
}

#[test]
fn explicit_runtime_and_custom_matcher() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let reg = MetricsRegistry::with_runtime(
        rt.handle().clone(),
        &InstrumentsConfig::default(),
        Arc::new(PrefixMatcher),
    )
    .unwrap();

    reg.set_gauge("db.pool", 4.0);
    reg.set_gauge("dbx", 1.0);
    reg.set_gauge("cache", 2.0);
    let mut found = reg.find_gauge_metrics("db");
    found.sort();
    assert_eq!(found, vec!["db.pool", "dbx"]);

    reg.measure_work("db.query", 3.0);
    assert_eq!(reg.active_ticks(), 2);
    reg.shutdown();
    assert_eq!(reg.active_ticks(), 0);
}
