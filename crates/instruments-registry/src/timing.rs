//! Completion-style timing wrapper.

use instruments_core::error::{InstrumentsError, Result};

use crate::registry::MetricsRegistry;
use crate::work::Work;

/// An operation whose every invocation is timed as work under one label.
///
/// Nothing is registered until the first invocation.
pub struct TimedCallback<F> {
    registry: MetricsRegistry,
    label: String,
    handler: F,
}

impl<F> TimedCallback<F> {
    pub(crate) fn new(registry: MetricsRegistry, label: &str, handler: F) -> Self {
        Self {
            registry,
            label: label.to_string(),
            handler,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Start a work, then run the handler with `args` and a `Completion`
    /// that stops the work before forwarding to `done`.
    ///
    /// A missing `done` is a usage error, reported before anything runs.
    pub fn invoke<A, T, D>(&self, args: A, done: Option<D>) -> Result<()>
    where
        F: Fn(A, Completion<T>),
        D: FnOnce(T) + Send + 'static,
    {
        let done = done.ok_or_else(|| InstrumentsError::MissingCompletion(self.label.clone()))?;
        let mut work = Work::new(&self.registry, &self.label);
        work.start()?;
        (self.handler)(
            args,
            Completion {
                work,
                done: Box::new(done),
            },
        );
        Ok(())
    }
}

/// Completion signal handed to a timed operation.
pub struct Completion<T> {
    work: Work,
    done: Box<dyn FnOnce(T) + Send>,
}

impl<T> Completion<T> {
    pub fn label(&self) -> &str {
        self.work.label()
    }

    pub fn complete(mut self, value: T) {
        if let Err(e) = self.work.stop(false) {
            tracing::warn!(label = self.work.label(), error = %e, "timed completion not recorded");
        }
        (self.done)(value)
    }
}
