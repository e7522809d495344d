//! # stackpulse - statistical call-stack sampling for managed runtimes
//!
//! The consumer-facing half of the stackpulse profiler. The low-level
//! sampling machinery lives in `stackpulse-core`; this crate adds the
//! [`stack_sampler::StackSampler`], which manages one armed sampler on
//! behalf of any number of concurrent profiling sessions on a thread:
//!
//! - computes the effective sampling interval as the minimum of the
//!   subscribers' desired intervals, re-arming when it changes
//! - expands each sampled frame into a full root-to-leaf call-stack
//!   identity list
//! - tracks per-subscriber asynchronous state from context-changed
//!   notifications, stitching pending-await hints into the recorded stack
//!
//! Report building and rendering are external concerns; subscribers
//! receive raw `(stack, elapsed, async_state)` triples and aggregate them
//! however they like.

pub mod stack_sampler;

pub use stack_sampler::{AsyncState, StackSampler, SubscribeError, SubscriberId, SubscriberTarget};
pub use stackpulse_core::{clock, domain, frame, sampler, timing};
pub use stackpulse_core::{frame_identity, FrameId, RuntimeFrame};
