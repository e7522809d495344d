//! Domain model for the sampling core
//!
//! Newtype ids for compile-time safety and structured error types for every
//! failure the public surface can report.

pub mod errors;
pub mod types;

pub use errors::{ArmError, ClockError, SampleError, TimingError, UsageError};
pub use types::{ContextToken, SubscriptionId};
