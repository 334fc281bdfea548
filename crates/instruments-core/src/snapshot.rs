//! Fixed-shape query results.
//!
//! Every field is always present; an unseen label yields the all-zero shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkSnapshot {
    pub label: String,
    pub ops_count: u64,
    pub rate_1m: f64,
    pub rate_5m: f64,
    pub rate_15m: f64,
    pub mean_rate: f64,
    pub min: f64,
    pub max: f64,
    pub mean_time: f64,
    pub std_dev: f64,
    pub pct_1: f64,
    pub pct_25: f64,
    pub pct_50: f64,
    pub pct_75: f64,
    pub pct_99: f64,
    pub pct_999: f64,
    pub active: i64,
    pub errors: u64,
    pub err_rate_1m: f64,
    pub err_rate_5m: f64,
    pub err_rate_15m: f64,
    pub err_mean_rate: f64,
}

impl WorkSnapshot {
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub label: String,
    pub count: u64,
    pub rate_1m: f64,
    pub rate_5m: f64,
    pub rate_15m: f64,
    pub rate_mean: f64,
}

impl EventSnapshot {
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GaugeSnapshot {
    pub label: String,
    pub value: f64,
}

impl GaugeSnapshot {
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: 0.0,
        }
    }
}

/// All categories at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub work: Vec<WorkSnapshot>,
    pub events: Vec<EventSnapshot>,
    pub gauges: Vec<GaugeSnapshot>,
}
