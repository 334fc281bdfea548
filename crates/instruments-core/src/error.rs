//! Shared error types across instruments crates.

use thiserror::Error;

/// Stable classification of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Programming mistake at the call site.
    Usage,
    /// Invalid configuration or sink target.
    Config,
    /// No async runtime available to schedule ticks or sends.
    Runtime,
}

impl ErrorKind {
    /// String representation used in logs and tests.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Usage => "USAGE",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Runtime => "RUNTIME",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, InstrumentsError>;

/// Unified error type used by core and registry.
#[derive(Debug, Error)]
pub enum InstrumentsError {
    #[error("a completion callback is required when timing {0}")]
    MissingCompletion(String),
    #[error("work metric {0} was released")]
    UnknownWork(String),
    #[error("work {0} stopped before it was started")]
    NotStarted(String),
    #[error("work {0} already stopped")]
    AlreadyStopped(String),
    #[error("no tokio runtime available")]
    NoRuntime,
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("sink: {0}")]
    Sink(String),
}

impl InstrumentsError {
    /// Map the error to its stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InstrumentsError::MissingCompletion(_)
            | InstrumentsError::UnknownWork(_)
            | InstrumentsError::NotStarted(_)
            | InstrumentsError::AlreadyStopped(_) => ErrorKind::Usage,
            InstrumentsError::BadConfig(_)
            | InstrumentsError::UnsupportedVersion
            | InstrumentsError::Sink(_) => ErrorKind::Config,
            InstrumentsError::NoRuntime => ErrorKind::Runtime,
        }
    }
}

/// Transport failure observed at the sink boundary.
///
/// Never returned from a record call; delivered through `Delivery`, the
/// registry error channel, and the log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sending {label} failed: {message}")]
pub struct SinkError {
    pub label: String,
    pub message: String,
}

impl SinkError {
    pub fn new(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            message: message.into(),
        }
    }
}
