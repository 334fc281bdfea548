//! In-flight timed operations.
//!
//! A `Work` never owns metrics; it holds its label and a registry handle and
//! drives the entry's active counter, timer, and error meter. A disabled
//! `Work` keeps the same call shape and touches nothing.

use std::time::{Duration, Instant};

use instruments_core::error::{InstrumentsError, Result};

use crate::registry::MetricsRegistry;
use crate::schedule::now;

enum Recorder {
    Registry(MetricsRegistry),
    Disabled,
}

pub struct Work {
    label: String,
    recorder: Recorder,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
}

impl Work {
    /// Tracked work; materializes the registry entry for `label`.
    pub fn new(registry: &MetricsRegistry, label: &str) -> Self {
        registry.register_work(label);
        Self {
            label: label.to_string(),
            recorder: Recorder::Registry(registry.clone()),
            started_at: None,
            stopped_at: None,
        }
    }

    /// Instrumentation switched off: start/stop record nothing and forward nothing.
    pub fn disabled(label: &str) -> Self {
        Self {
            label: label.to_string(),
            recorder: Recorder::Disabled,
            started_at: None,
            stopped_at: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.recorder, Recorder::Disabled)
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn stopped_at(&self) -> Option<Instant> {
        self.stopped_at
    }

    /// Time between start and stop, once both happened.
    pub fn elapsed(&self) -> Option<Duration> {
        Some(self.stopped_at?.saturating_duration_since(self.started_at?))
    }

    /// Mark the work in flight (increments the entry's active count).
    pub fn start(&mut self) -> Result<()> {
        let Recorder::Registry(registry) = &self.recorder else {
            return Ok(());
        };
        registry.work_started(&self.label)?;
        self.started_at = Some(now());
        Ok(())
    }

    /// Record the elapsed time and, on error, an error mark instead of a timing sample.
    pub fn stop(&mut self, error: bool) -> Result<Duration> {
        let Recorder::Registry(registry) = &self.recorder else {
            return Ok(Duration::ZERO);
        };
        let started = self
            .started_at
            .ok_or_else(|| InstrumentsError::NotStarted(self.label.clone()))?;
        if self.stopped_at.is_some() {
            return Err(InstrumentsError::AlreadyStopped(self.label.clone()));
        }

        let stopped = now();
        let elapsed = stopped.saturating_duration_since(started);
        registry.work_stopped(&self.label, elapsed, error)?;
        self.stopped_at = Some(stopped);
        Ok(elapsed)
    }

    /// Give up on in-flight work: the active count drops, nothing is sampled
    /// or forwarded.
    pub fn abandon(&mut self) -> Result<()> {
        let Recorder::Registry(registry) = &self.recorder else {
            return Ok(());
        };
        if self.started_at.is_none() {
            return Err(InstrumentsError::NotStarted(self.label.clone()));
        }
        if self.stopped_at.is_some() {
            return Err(InstrumentsError::AlreadyStopped(self.label.clone()));
        }
        registry.work_abandoned(&self.label)?;
        self.stopped_at = Some(now());
        Ok(())
    }

    fn in_flight(&self) -> bool {
        self.started_at.is_some() && self.stopped_at.is_none()
    }
}

/// Abandons its work on drop unless it was stopped first.
pub(crate) struct InFlight(pub(crate) Work);

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight() {
            if let Err(e) = self.0.abandon() {
                tracing::debug!(label = self.0.label(), error = %e, "abandoned work not released");
            }
        }
    }
}

/// Counts an operation as an event and times it as work under one label.
pub struct RecordWork {
    work: Work,
}

impl RecordWork {
    /// Records one event for `label` and prepares (does not start) the work.
    pub fn new(registry: &MetricsRegistry, label: &str) -> Self {
        registry.record_event(label);
        Self {
            work: Work::new(registry, label),
        }
    }

    pub fn start(mut self) -> Result<Self> {
        self.work.start()?;
        Ok(self)
    }

    pub fn stop(&mut self, error: bool) -> Result<Duration> {
        self.work.stop(error)
    }

    pub fn work(&self) -> &Work {
        &self.work
    }

    /// Completion that stops the work (error when the result is `Err`) and
    /// then hands the result to `done` unchanged.
    pub fn wrap<T, E, F>(self, done: F) -> impl FnOnce(std::result::Result<T, E>)
    where
        F: FnOnce(std::result::Result<T, E>),
    {
        let mut work = self.work;
        move |result| {
            if let Err(e) = work.stop(result.is_err()) {
                tracing::warn!(label = work.label(), error = %e, "work completion not recorded");
            }
            done(result)
        }
    }
}
