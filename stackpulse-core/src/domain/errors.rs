//! Structured error types for the sampling core
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Errors from the per-event hot path always disarm the sampler before they
//! propagate; continuing to dispatch through a broken subsystem risks
//! cascading failures in the host program.

use super::types::SubscriptionId;
use thiserror::Error;

/// Bad sampler configuration. Reported synchronously by the arm entry
/// point; no state has been changed when one of these is returned.
#[derive(Error, Debug)]
pub enum UsageError {
    #[error("timer mode `custom` requires a timer function")]
    MissingTimerFunction,

    #[error("a timer function is only accepted with timer mode `custom`")]
    UnexpectedTimerFunction,
}

/// Failure of the active time source.
///
/// The built-in clocks fall back internally and never surface here; only a
/// caller-supplied time function can fail.
#[derive(Error, Debug)]
pub enum ClockError {
    #[error("timer function failed: {0}")]
    TimerFunction(anyhow::Error),
}

/// Shared timing thread subscription errors. These never affect other
/// subscribers.
#[derive(Error, Debug)]
pub enum TimingError {
    #[error("too many concurrent timing subscribers (limit {limit})")]
    TooManySubscribers { limit: usize },

    #[error("{0} is not a live timing subscription")]
    NotSubscribed(SubscriptionId),

    #[error("failed to start the timing thread")]
    ThreadSpawn(#[from] std::io::Error),
}

/// Errors surfaced while arming a sampler.
#[derive(Error, Debug)]
pub enum ArmError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Timing(#[from] TimingError),

    #[error(transparent)]
    Clock(#[from] ClockError),
}

/// Errors surfaced by the per-event sampling path. Any of these disarms
/// the sampler before propagating.
#[derive(Error, Debug)]
pub enum SampleError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error("sample callback failed while handling {frame}: {source}")]
    Callback { frame: String, source: anyhow::Error },
}
