//! Monotonic wall-clock readings for the sampling hot path
//!
//! Two variants are exposed: the precise monotonic clock, and a coarse
//! variant whose resolution is bounded by the platform but which is cheaper
//! to read. Requesting the coarse variant on a platform without one
//! transparently falls back to the precise clock.
//!
//! Readings are `f64` seconds. Both variants are non-decreasing within a
//! process run; coarse readings may repeat across many calls inside one
//! resolution window.

use std::sync::OnceLock;
use std::time::Instant;

/// Selects between the full-precision monotonic clock and the cheaper
/// bounded-resolution variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    Precise,
    Coarse,
}

/// Current time in seconds under the requested mode.
#[must_use]
pub fn now(mode: ClockMode) -> f64 {
    match mode {
        ClockMode::Precise => platform::precise(),
        ClockMode::Coarse => platform::coarse().unwrap_or_else(platform::precise),
    }
}

/// Resolution of the coarse clock in seconds, or `None` when the platform
/// exposes no coarse clock. Cached after the first query.
#[must_use]
pub fn coarse_resolution() -> Option<f64> {
    platform::coarse_resolution()
}

/// Empirically measured per-call cost of each timer variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerOverhead {
    /// Average seconds per precise reading.
    pub precise: f64,
    /// Average seconds per coarse reading; absent when the platform has no
    /// coarse clock.
    pub coarse: Option<f64>,
}

/// Wall-clock budget for one overhead probe.
const OVERHEAD_BUDGET: f64 = 100e-6;
/// Upper bound on probe iterations, in case the clock is extremely cheap.
const OVERHEAD_ITERATION_CAP: u32 = 10_000;

/// Measure the per-call cost of each timer variant by back-to-back
/// invocation, stopping once [`OVERHEAD_BUDGET`] has elapsed or after
/// [`OVERHEAD_ITERATION_CAP`] iterations. Callers use the result to choose
/// a timer mode adaptively.
#[must_use]
pub fn measure_timer_overhead() -> TimerOverhead {
    TimerOverhead {
        precise: measure_call_cost(|| now(ClockMode::Precise)),
        coarse: coarse_resolution().map(|_| measure_call_cost(|| now(ClockMode::Coarse))),
    }
}

fn measure_call_cost(mut timer: impl FnMut() -> f64) -> f64 {
    let start = now(ClockMode::Precise);
    let mut iterations = 0u32;
    loop {
        std::hint::black_box(timer());
        iterations += 1;
        let elapsed = now(ClockMode::Precise) - start;
        if elapsed >= OVERHEAD_BUDGET || iterations == OVERHEAD_ITERATION_CAP {
            return elapsed / f64::from(iterations);
        }
    }
}

/// Last-resort clock: seconds since the first reading in this process.
/// Only reached when no platform clock API succeeds.
fn fallback_elapsed() -> f64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs_f64()
}

#[cfg(unix)]
mod platform {
    #![allow(unsafe_code)] // thin clock_gettime/clock_getres wrappers
    #![allow(clippy::cast_precision_loss)]

    const SEC_PER_NSEC: f64 = 1e-9;

    fn gettime(clock: libc::clockid_t) -> Option<f64> {
        let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
        // SAFETY: `ts` is a valid out-pointer for the duration of the call.
        let rc = unsafe { libc::clock_gettime(clock, &mut ts) };
        (rc == 0).then(|| ts.tv_sec as f64 + ts.tv_nsec as f64 * SEC_PER_NSEC)
    }

    pub fn precise() -> f64 {
        gettime(libc::CLOCK_MONOTONIC)
            .or_else(|| gettime(libc::CLOCK_REALTIME))
            .unwrap_or_else(super::fallback_elapsed)
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn coarse() -> Option<f64> {
        // The resolution query doubles as the availability probe.
        coarse_resolution()?;
        gettime(libc::CLOCK_MONOTONIC_COARSE)
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn coarse_resolution() -> Option<f64> {
        use std::sync::OnceLock;
        static RESOLUTION: OnceLock<Option<f64>> = OnceLock::new();
        *RESOLUTION.get_or_init(|| {
            let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
            // SAFETY: `ts` is a valid out-pointer for the duration of the call.
            let rc = unsafe { libc::clock_getres(libc::CLOCK_MONOTONIC_COARSE, &mut ts) };
            (rc == 0).then(|| ts.tv_sec as f64 + ts.tv_nsec as f64 * SEC_PER_NSEC)
        })
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub fn coarse() -> Option<f64> {
        None
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub fn coarse_resolution() -> Option<f64> {
        None
    }
}

#[cfg(not(unix))]
mod platform {
    pub fn precise() -> f64 {
        super::fallback_elapsed()
    }

    pub fn coarse() -> Option<f64> {
        None
    }

    pub fn coarse_resolution() -> Option<f64> {
        None
    }
}
