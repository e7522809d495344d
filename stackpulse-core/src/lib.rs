//! # stackpulse-core - statistical sampling core for managed runtimes
//!
//! The low-level half of the stackpulse profiler. Instead of recording every
//! call and return (prohibitively expensive), the sampler watches the host
//! runtime's event stream and decides, per event, whether enough wall-clock
//! time has elapsed to justify an expensive stack walk.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Host Runtime                            │
//! │         (call / return / exception dispatch hook)           │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │ events
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Sampler State Machine                    │
//! │   context tracking · await hints · rate limiting            │
//! └───────┬──────────────────┬──────────────────────┬───────────┘
//!         │ time reads       │ frame identities     │ samples
//!         ▼                  ▼                      ▼
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────────────┐
//! │ Clock Source │   │ Frame Encoder │   │  Target callback    │
//! │ or Timing    │   │ (packed ids)  │   │  (aggregator, ext.) │
//! │ Thread       │   └───────────────┘   └─────────────────────┘
//! └──────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`clock`]: monotonic wall-clock readings, precise and coarse variants,
//!   plus empirical per-call overhead measurement
//! - [`timing`]: a shared background thread that refreshes a timestamp at
//!   the finest interval any subscriber needs, so samplers can read time
//!   with a single atomic load instead of a syscall per event
//! - [`frame`]: the [`frame::RuntimeFrame`] seam to the host runtime and
//!   the packed frame-identity encoding used to label samples
//! - [`sampler`]: the per-session state machine: arm/disarm, context-change
//!   detection, pending-await bookkeeping, and rate-limited dispatch to the
//!   target callback
//! - [`domain`]: newtype ids and structured error types
//!
//! The sampler runs synchronously on the host program's own thread. The
//! timing thread is the only background thread in the system and stops
//! itself when its last subscriber leaves.

pub mod clock;
pub mod domain;
pub mod frame;
pub mod sampler;
pub mod timing;

pub use frame::{frame_identity, FrameId, RuntimeFrame};
