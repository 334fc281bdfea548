//! Instrumentation config loader (strict parsing).

pub mod schema;

use std::fs;

use instruments_core::error::{InstrumentsError, Result};

pub use schema::{InstrumentsConfig, MeterSection, SinkSection, TimerSection};

pub fn load_from_file(path: &str) -> Result<InstrumentsConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| InstrumentsError::BadConfig(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<InstrumentsConfig> {
    let cfg: InstrumentsConfig = serde_yaml::from_str(s)
        .map_err(|e| InstrumentsError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
