use std::time::Duration;

use serde::Deserialize;

use instruments_core::error::{InstrumentsError, Result};
use instruments_core::stats::{TimerSettings, MAX_PRIORITY_EXPONENT};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentsConfig {
    pub version: u32,

    /// Absent means forwarding is disabled (null sink).
    #[serde(default)]
    pub sink: Option<SinkSection>,

    #[serde(default)]
    pub meter: MeterSection,

    #[serde(default)]
    pub timer: TimerSection,
}

impl Default for InstrumentsConfig {
    fn default() -> Self {
        Self {
            version: 1,
            sink: None,
            meter: MeterSection::default(),
            timer: TimerSection::default(),
        }
    }
}

impl InstrumentsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(InstrumentsError::UnsupportedVersion);
        }
        if let Some(sink) = &self.sink {
            sink.validate()?;
        }
        self.meter.validate()?;
        self.timer.validate()?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.meter.tick_interval_ms)
    }

    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings {
            reservoir_size: self.timer.reservoir_size,
            decay_alpha: self.timer.decay_alpha,
            rescale_interval: Duration::from_secs(self.timer.rescale_interval_secs),
            tick_interval: self.tick_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkSection {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl SinkSection {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(InstrumentsError::BadConfig("sink.host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(InstrumentsError::BadConfig("sink.port must not be 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeterSection {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for MeterSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl MeterSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=60_000).contains(&self.tick_interval_ms) {
            return Err(InstrumentsError::BadConfig(
                "meter.tick_interval_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimerSection {
    #[serde(default = "default_reservoir_size")]
    pub reservoir_size: usize,

    #[serde(default = "default_decay_alpha")]
    pub decay_alpha: f64,

    #[serde(default = "default_rescale_interval_secs")]
    pub rescale_interval_secs: u64,
}

impl Default for TimerSection {
    fn default() -> Self {
        Self {
            reservoir_size: default_reservoir_size(),
            decay_alpha: default_decay_alpha(),
            rescale_interval_secs: default_rescale_interval_secs(),
        }
    }
}

impl TimerSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=65_536).contains(&self.reservoir_size) {
            return Err(InstrumentsError::BadConfig(
                "timer.reservoir_size must be between 1 and 65536".into(),
            ));
        }
        if !(self.decay_alpha > 0.0 && self.decay_alpha <= 1.0) {
            return Err(InstrumentsError::BadConfig(
                "timer.decay_alpha must be in (0, 1]".into(),
            ));
        }
        if self.rescale_interval_secs == 0 {
            return Err(InstrumentsError::BadConfig(
                "timer.rescale_interval_secs must be at least 1".into(),
            ));
        }
        if self.decay_alpha * self.rescale_interval_secs as f64 >= MAX_PRIORITY_EXPONENT {
            return Err(InstrumentsError::BadConfig(format!(
                "timer.decay_alpha * timer.rescale_interval_secs must be below {MAX_PRIORITY_EXPONENT}"
            )));
        }
        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_tick_interval_ms() -> u64 {
    5000
}
fn default_reservoir_size() -> usize {
    1028
}
fn default_decay_alpha() -> f64 {
    0.015
}
fn default_rescale_interval_secs() -> u64 {
    3600
}
