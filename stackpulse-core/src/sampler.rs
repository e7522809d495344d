//! Event-driven statistical sampler
//!
//! One [`Sampler`] per active profiling session. The host runtime delivers
//! every call/return/exception event to [`Sampler::handle`], which applies
//! the per-event pipeline:
//!
//! 1. read the configured time source (failure disarms the session)
//! 2. detect context-local changes and synthesize `ContextChanged`
//! 3. maintain the pending-await hint queue
//! 4. rate-limit: invoke the target callback only when the sampling
//!    interval has elapsed
//!
//! Context-change detection and await bookkeeping run on every event
//! regardless of the rate limiter. They are structural bookkeeping that
//! must not be skipped; the expensive call into the external aggregator is
//! exactly what rate limiting protects.
//!
//! The sampler runs synchronously, inline with the host program's own
//! thread. It never spawns threads and never suspends on its own.

use std::rc::Rc;

use log::{debug, warn};

use crate::clock::{self, ClockMode};
use crate::domain::{ArmError, ClockError, ContextToken, SampleError, SubscriptionId, UsageError};
use crate::frame::{describe, frame_identity, EventKind, FrameId, NativeSymbol, RuntimeFrame};
use crate::timing;

/// Default sampling interval when the configured one is not strictly
/// positive.
pub const DEFAULT_INTERVAL: f64 = 0.001;

/// Where the sampler reads time from. Exactly one source is active per
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// The precise monotonic clock, one syscall per event.
    Precise,
    /// The coarse monotonic clock; transparently precise where the
    /// platform has no coarse variant.
    Coarse,
    /// The shared timing thread: one atomic load per event.
    SharedThread,
    /// A caller-supplied time function.
    Custom,
}

/// Caller-supplied time function for [`TimerMode::Custom`]. Must return
/// monotonic non-decreasing seconds.
pub type TimerFn = Box<dyn FnMut() -> anyhow::Result<f64>>;

/// Read access to the host's context-local value, compared by identity.
/// Used to detect when execution switched logical tasks between events.
pub trait ContextSource {
    fn current(&self) -> Option<ContextToken>;
}

/// Synthetic payload for [`EventKind::ContextChanged`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextChange {
    pub new: Option<ContextToken>,
    pub old: Option<ContextToken>,
    /// Snapshot of the pending-await queue at the moment of the switch.
    /// Used downstream to stitch asynchronous call trees.
    pub await_stack: Vec<FrameId>,
}

/// Payload accompanying a sample callback.
#[derive(Debug, Clone, Copy)]
pub enum SamplePayload<'a> {
    /// Foreign-function identity, present on native call/return/exception
    /// events.
    Native(&'a NativeSymbol),
    /// Synthesized on a logical-context switch.
    ContextChange(&'a ContextChange),
}

/// Receives sampled events.
///
/// The sink must not re-enter the sampler that invoked it. An error return
/// disarms the session before it propagates.
pub trait SampleSink {
    /// Called with the sampled frame, the event kind that triggered the
    /// sample, and the payload, if any. The return value is discarded on
    /// success.
    fn on_event(
        &mut self,
        frame: &dyn RuntimeFrame,
        kind: EventKind,
        payload: Option<SamplePayload<'_>>,
    ) -> anyhow::Result<()>;
}

impl<F> SampleSink for F
where
    F: FnMut(&dyn RuntimeFrame, EventKind, Option<SamplePayload<'_>>) -> anyhow::Result<()>,
{
    fn on_event(
        &mut self,
        frame: &dyn RuntimeFrame,
        kind: EventKind,
        payload: Option<SamplePayload<'_>>,
    ) -> anyhow::Result<()> {
        self(frame, kind, payload)
    }
}

/// One event delivered by the host runtime's dispatch hook.
pub struct Event<'a> {
    pub kind: EventKind,
    pub frame: &'a dyn RuntimeFrame,
    /// Foreign callee identity on native events.
    pub native: Option<&'a NativeSymbol>,
}

impl<'a> Event<'a> {
    #[must_use]
    pub fn new(kind: EventKind, frame: &'a dyn RuntimeFrame) -> Self {
        Self { kind, frame, native: None }
    }

    #[must_use]
    pub fn with_native(mut self, symbol: &'a NativeSymbol) -> Self {
        self.native = Some(symbol);
        self
    }
}

/// What the state machine did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The sampling interval had elapsed; the target was invoked.
    Sampled,
    /// Inside the sampling window; bookkeeping only.
    Skipped,
    /// The sampler is disarmed; nothing ran.
    Ignored,
}

/// Configuration for [`Sampler::arm`].
pub struct SamplerConfig {
    /// Seconds between samples. Non-positive values fall back to
    /// [`DEFAULT_INTERVAL`].
    pub interval: f64,
    pub timer: TimerMode,
    /// Required with [`TimerMode::Custom`], rejected otherwise.
    pub timer_func: Option<TimerFn>,
    /// Enables context-change detection when present.
    pub context: Option<Rc<dyn ContextSource>>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { interval: DEFAULT_INTERVAL, timer: TimerMode::Precise, timer_func: None, context: None }
    }
}

enum TimeSource {
    Clock(ClockMode),
    Shared(SharedSubscription),
    Custom(TimerFn),
}

impl TimeSource {
    fn now(&mut self) -> Result<f64, ClockError> {
        match self {
            Self::Clock(mode) => Ok(clock::now(*mode)),
            Self::Shared(_) => Ok(timing::shared().current_time()),
            Self::Custom(timer) => timer().map_err(ClockError::TimerFunction),
        }
    }

    fn release(&mut self) {
        if let Self::Shared(subscription) = self {
            subscription.release();
        }
    }
}

/// Borrowed registration with the shared timing thread. Released on disarm
/// or on drop, whichever comes first.
struct SharedSubscription {
    id: Option<SubscriptionId>,
}

impl SharedSubscription {
    fn acquire(interval: f64) -> Result<Self, ArmError> {
        let id = timing::shared().subscribe(interval)?;
        Ok(Self { id: Some(id) })
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            if let Err(err) = timing::shared().unsubscribe(id) {
                warn!("failed to release timing subscription: {err}");
            }
        }
    }
}

impl Drop for SharedSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

struct ContextTracking {
    source: Rc<dyn ContextSource>,
    last_value: Option<ContextToken>,
}

/// Per-session sampler state machine. Armed on construction, disarmed by
/// [`disarm`](Self::disarm) or drop.
pub struct Sampler {
    target: Box<dyn SampleSink>,
    interval: f64,
    last_sample: f64,
    time_source: TimeSource,
    context: Option<ContextTracking>,
    /// Pending-await hint: identities of frames that just suspended. Valid
    /// only for the instant after a return from a suspend point; any other
    /// event clears it.
    await_stack: Vec<FrameId>,
    armed: bool,
}

impl Sampler {
    /// Arm a new sampling session.
    ///
    /// Validates the timer configuration, resolves the time source
    /// (subscribing to the shared timing thread for
    /// [`TimerMode::SharedThread`]), seeds the last-sample timestamp with
    /// the current time so the very first event does not always trigger a
    /// sample, and captures the context source's current token.
    ///
    /// # Errors
    ///
    /// [`UsageError`] on an incompatible timer mode and function
    /// combination, before any state is armed; timing subscription and
    /// time-function failures propagate as their own variants.
    pub fn arm(target: Box<dyn SampleSink>, config: SamplerConfig) -> Result<Self, ArmError> {
        let SamplerConfig { interval, timer, timer_func, context } = config;

        let mut time_source = match (timer, timer_func) {
            (TimerMode::Custom, Some(timer_func)) => TimeSource::Custom(timer_func),
            (TimerMode::Custom, None) => return Err(UsageError::MissingTimerFunction.into()),
            (_, Some(_)) => return Err(UsageError::UnexpectedTimerFunction.into()),
            (TimerMode::Precise, None) => TimeSource::Clock(ClockMode::Precise),
            (TimerMode::Coarse, None) => TimeSource::Clock(ClockMode::Coarse),
            (TimerMode::SharedThread, None) => {
                TimeSource::Shared(SharedSubscription::acquire(if interval > 0.0 {
                    interval
                } else {
                    DEFAULT_INTERVAL
                })?)
            }
        };

        let interval = if interval > 0.0 { interval } else { DEFAULT_INTERVAL };
        let last_sample = time_source.now()?;
        let context = context.map(|source| {
            let last_value = source.current();
            ContextTracking { source, last_value }
        });

        debug!("sampler armed at {interval}s");
        Ok(Self {
            target,
            interval,
            last_sample,
            time_source,
            context,
            await_stack: Vec::new(),
            armed: true,
        })
    }

    /// Uninstall the session: releases any timing-thread subscription and
    /// stops all further dispatch. Idempotent; in-flight callbacks are not
    /// interrupted, but no event delivered after this returns reaches the
    /// target.
    pub fn disarm(&mut self) {
        if self.armed {
            self.armed = false;
            self.time_source.release();
            debug!("sampler disarmed");
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Effective sampling interval in seconds.
    #[must_use]
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Replace the target callback. The previous one is released.
    pub fn set_target(&mut self, target: Box<dyn SampleSink>) {
        self.target = target;
    }

    /// Process one runtime event.
    ///
    /// # Errors
    ///
    /// [`SampleError::Clock`] when the time source fails and
    /// [`SampleError::Callback`] when the target fails. Either disarms the
    /// session before returning.
    pub fn handle(&mut self, event: &Event<'_>) -> Result<EventOutcome, SampleError> {
        if !self.armed {
            return Ok(EventOutcome::Ignored);
        }

        let now = match self.time_source.now() {
            Ok(now) => now,
            Err(err) => {
                // The hook cannot keep running without a trustworthy clock.
                self.disarm();
                return Err(err.into());
            }
        };

        self.detect_context_change(event)?;
        self.track_pending_await(event);

        if now < self.last_sample + self.interval {
            return Ok(EventOutcome::Skipped);
        }
        self.last_sample = now;

        let payload = event.native.map(SamplePayload::Native);
        if let Err(err) = self.target.on_event(event.frame, event.kind, payload) {
            self.disarm();
            return Err(SampleError::Callback { frame: describe(event.frame), source: err });
        }
        Ok(EventOutcome::Sampled)
    }

    fn detect_context_change(&mut self, event: &Event<'_>) -> Result<(), SampleError> {
        let Some(tracking) = &mut self.context else {
            return Ok(());
        };
        let new = tracking.source.current();
        if new == tracking.last_value {
            return Ok(());
        }
        // Store the new token before dispatch so a callback that touches
        // the context cannot re-trigger on the same change.
        let old = std::mem::replace(&mut tracking.last_value, new);

        // A call event fires before the child has logically started in the
        // new context; attribute the switch to the caller.
        let change_frame = if event.kind == EventKind::Call {
            event.frame.parent().unwrap_or(event.frame)
        } else {
            event.frame
        };

        let change = ContextChange { new, old, await_stack: self.await_stack.clone() };
        let payload = SamplePayload::ContextChange(&change);
        if let Err(err) = self.target.on_event(change_frame, EventKind::ContextChanged, Some(payload)) {
            self.disarm();
            return Err(SampleError::Callback { frame: describe(change_frame), source: err });
        }
        Ok(())
    }

    fn track_pending_await(&mut self, event: &Event<'_>) {
        if event.kind == EventKind::Return && event.frame.is_suspend_point() {
            // Record what was suspended, in case it does not resume before
            // the next sample.
            self.await_stack.push(frame_identity(event.frame));
        } else {
            self.await_stack.clear();
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameSnapshot;
    use std::cell::{Cell, RefCell};

    fn frame(name: &str) -> FrameSnapshot {
        FrameSnapshot::new(name, "app.py", 1)
    }

    struct ScriptedTime(Rc<Cell<f64>>);

    impl ScriptedTime {
        fn new() -> (Self, TimerFn) {
            let time = Rc::new(Cell::new(0.0));
            let handle = Rc::clone(&time);
            (Self(time), Box::new(move || Ok(handle.get())))
        }

        fn set(&self, value: f64) {
            self.0.set(value);
        }
    }

    #[derive(Default)]
    struct Recorded {
        samples: Vec<(String, EventKind)>,
        changes: Vec<ContextChange>,
        change_frames: Vec<String>,
    }

    fn recording_sink(log: &Rc<RefCell<Recorded>>) -> Box<dyn SampleSink> {
        let log = Rc::clone(log);
        Box::new(
            move |frame: &dyn RuntimeFrame,
                  kind: EventKind,
                  payload: Option<SamplePayload<'_>>|
                  -> anyhow::Result<()> {
                let mut log = log.borrow_mut();
                if let Some(SamplePayload::ContextChange(change)) = payload {
                    log.changes.push(change.clone());
                    log.change_frames.push(frame.code_name().to_string());
                } else {
                    log.samples.push((frame.code_name().to_string(), kind));
                }
                Ok(())
            },
        )
    }

    fn armed(interval: f64, timer_func: TimerFn, log: &Rc<RefCell<Recorded>>) -> Sampler {
        Sampler::arm(
            recording_sink(log),
            SamplerConfig {
                interval,
                timer: TimerMode::Custom,
                timer_func: Some(timer_func),
                ..SamplerConfig::default()
            },
        )
        .unwrap()
    }

    struct ScriptedContext(Cell<Option<ContextToken>>);

    impl ScriptedContext {
        fn new(initial: Option<ContextToken>) -> Rc<Self> {
            Rc::new(Self(Cell::new(initial)))
        }

        fn set(&self, token: Option<ContextToken>) {
            self.0.set(token);
        }
    }

    impl ContextSource for ScriptedContext {
        fn current(&self) -> Option<ContextToken> {
            self.0.get()
        }
    }

    #[test]
    fn test_default_interval_applied() {
        let log = Rc::new(RefCell::new(Recorded::default()));
        let (_time, timer) = ScriptedTime::new();
        let sampler = armed(0.0, timer, &log);
        assert!((sampler.interval() - DEFAULT_INTERVAL).abs() < f64::EPSILON);
    }

    #[test]
    fn test_usage_error_custom_without_function() {
        let log = Rc::new(RefCell::new(Recorded::default()));
        let result = Sampler::arm(
            recording_sink(&log),
            SamplerConfig { timer: TimerMode::Custom, ..SamplerConfig::default() },
        );
        assert!(matches!(result, Err(ArmError::Usage(UsageError::MissingTimerFunction))));
    }

    #[test]
    fn test_usage_error_function_without_custom_mode() {
        let log = Rc::new(RefCell::new(Recorded::default()));
        let (_time, timer) = ScriptedTime::new();
        let result = Sampler::arm(
            recording_sink(&log),
            SamplerConfig { timer_func: Some(timer), ..SamplerConfig::default() },
        );
        assert!(matches!(result, Err(ArmError::Usage(UsageError::UnexpectedTimerFunction))));
    }

    #[test]
    fn test_rate_limiting_window() {
        let log = Rc::new(RefCell::new(Recorded::default()));
        let (time, timer) = ScriptedTime::new();
        let mut sampler = armed(0.010, timer, &log);
        let main = frame("main");

        // Inside the first window: armed at t=0, so t=0 does not sample.
        assert_eq!(sampler.handle(&Event::new(EventKind::Call, &main)).unwrap(), EventOutcome::Skipped);

        time.set(0.011);
        assert_eq!(sampler.handle(&Event::new(EventKind::Call, &main)).unwrap(), EventOutcome::Sampled);

        time.set(0.015);
        assert_eq!(sampler.handle(&Event::new(EventKind::Return, &main)).unwrap(), EventOutcome::Skipped);

        time.set(0.022);
        assert_eq!(sampler.handle(&Event::new(EventKind::Return, &main)).unwrap(), EventOutcome::Sampled);

        assert_eq!(log.borrow().samples.len(), 2);
    }

    #[test]
    fn test_constant_time_triggers_once() {
        let log = Rc::new(RefCell::new(Recorded::default()));
        let (time, timer) = ScriptedTime::new();
        let mut sampler = armed(0.010, timer, &log);
        let main = frame("main");

        time.set(1.0);
        let outcomes: Vec<_> = (0..5)
            .map(|_| sampler.handle(&Event::new(EventKind::Call, &main)).unwrap())
            .collect();
        assert_eq!(
            outcomes,
            vec![
                EventOutcome::Sampled,
                EventOutcome::Skipped,
                EventOutcome::Skipped,
                EventOutcome::Skipped,
                EventOutcome::Skipped,
            ]
        );
        assert_eq!(log.borrow().samples.len(), 1);
    }

    #[test]
    fn test_context_change_sequence() {
        let token_a = ContextToken(1);
        let token_b = ContextToken(2);
        let context = ScriptedContext::new(Some(token_a));
        let log = Rc::new(RefCell::new(Recorded::default()));
        let (_time, timer) = ScriptedTime::new();
        let mut sampler = Sampler::arm(
            recording_sink(&log),
            SamplerConfig {
                interval: 10.0,
                timer: TimerMode::Custom,
                timer_func: Some(timer),
                context: Some(Rc::clone(&context) as Rc<dyn ContextSource>),
            },
        )
        .unwrap();
        let main = frame("main");

        // Observed context values across five events: A, A, B, B, A.
        for token in [Some(token_a), Some(token_a), Some(token_b), Some(token_b), Some(token_a)] {
            context.set(token);
            sampler.handle(&Event::new(EventKind::Return, &main)).unwrap();
        }

        let log = log.borrow();
        assert_eq!(log.changes.len(), 2);
        assert_eq!((log.changes[0].new, log.changes[0].old), (Some(token_b), Some(token_a)));
        assert_eq!((log.changes[1].new, log.changes[1].old), (Some(token_a), Some(token_b)));
    }

    #[test]
    fn test_context_change_targets_parent_on_call() {
        let context = ScriptedContext::new(Some(ContextToken(1)));
        let log = Rc::new(RefCell::new(Recorded::default()));
        let (_time, timer) = ScriptedTime::new();
        let mut sampler = Sampler::arm(
            recording_sink(&log),
            SamplerConfig {
                interval: 10.0,
                timer: TimerMode::Custom,
                timer_func: Some(timer),
                context: Some(Rc::clone(&context) as Rc<dyn ContextSource>),
            },
        )
        .unwrap();

        let child = frame("child").with_parent(frame("caller"));
        context.set(Some(ContextToken(2)));
        sampler.handle(&Event::new(EventKind::Call, &child)).unwrap();

        // The child has not logically started in the new context yet.
        context.set(Some(ContextToken(3)));
        sampler.handle(&Event::new(EventKind::Return, &child)).unwrap();

        let log = log.borrow();
        assert_eq!(log.change_frames, vec!["caller".to_string(), "child".to_string()]);
    }

    #[test]
    fn test_await_queue_records_suspend_returns() {
        let log = Rc::new(RefCell::new(Recorded::default()));
        let (_time, timer) = ScriptedTime::new();
        let mut sampler = armed(10.0, timer, &log);

        let coroutine = frame("fetch").with_suspend_point();
        sampler.handle(&Event::new(EventKind::Return, &coroutine)).unwrap();
        assert_eq!(sampler.await_stack, vec![frame_identity(&coroutine)]);

        // Any other event clears the hint.
        sampler.handle(&Event::new(EventKind::Call, &frame("other"))).unwrap();
        assert!(sampler.await_stack.is_empty());
    }

    #[test]
    fn test_context_change_snapshots_await_queue() {
        let context = ScriptedContext::new(Some(ContextToken(1)));
        let log = Rc::new(RefCell::new(Recorded::default()));
        let (_time, timer) = ScriptedTime::new();
        let mut sampler = Sampler::arm(
            recording_sink(&log),
            SamplerConfig {
                interval: 10.0,
                timer: TimerMode::Custom,
                timer_func: Some(timer),
                context: Some(Rc::clone(&context) as Rc<dyn ContextSource>),
            },
        )
        .unwrap();

        let coroutine = frame("fetch").with_suspend_point();
        sampler.handle(&Event::new(EventKind::Return, &coroutine)).unwrap();

        // The switch is observed on the next event, before the queue is
        // cleared by it.
        context.set(Some(ContextToken(2)));
        sampler.handle(&Event::new(EventKind::Call, &frame("scheduler"))).unwrap();

        let log = log.borrow();
        assert_eq!(log.changes.len(), 1);
        assert_eq!(log.changes[0].await_stack, vec![frame_identity(&coroutine)]);
        assert!(sampler.await_stack.is_empty());
    }

    #[test]
    fn test_callback_failure_disarms() {
        let calls = Rc::new(Cell::new(0u32));
        let sink = {
            let calls = Rc::clone(&calls);
            move |_: &dyn RuntimeFrame, _: EventKind, _: Option<SamplePayload<'_>>| -> anyhow::Result<()> {
                calls.set(calls.get() + 1);
                anyhow::bail!("aggregator refused the sample")
            }
        };
        let (time, timer) = ScriptedTime::new();
        let mut sampler = Sampler::arm(
            Box::new(sink),
            SamplerConfig {
                interval: 0.010,
                timer: TimerMode::Custom,
                timer_func: Some(timer),
                ..SamplerConfig::default()
            },
        )
        .unwrap();
        let main = frame("main");

        time.set(1.0);
        let err = sampler.handle(&Event::new(EventKind::Call, &main)).unwrap_err();
        assert!(matches!(err, SampleError::Callback { .. }));
        assert!(!sampler.is_armed());

        // Delivery after the failure never reaches the target.
        time.set(2.0);
        assert_eq!(sampler.handle(&Event::new(EventKind::Call, &main)).unwrap(), EventOutcome::Ignored);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_timer_failure_disarms() {
        let log = Rc::new(RefCell::new(Recorded::default()));
        let failures = Rc::new(Cell::new(false));
        let flag = Rc::clone(&failures);
        let timer: TimerFn = Box::new(move || {
            if flag.get() {
                anyhow::bail!("timer backend gone")
            }
            Ok(0.0)
        });
        let mut sampler = armed(0.010, timer, &log);

        failures.set(true);
        let err = sampler.handle(&Event::new(EventKind::Call, &frame("main"))).unwrap_err();
        assert!(matches!(err, SampleError::Clock(_)));
        assert!(!sampler.is_armed());
    }

    #[test]
    fn test_disarm_stops_dispatch() {
        let log = Rc::new(RefCell::new(Recorded::default()));
        let (time, timer) = ScriptedTime::new();
        let mut sampler = armed(0.010, timer, &log);

        sampler.disarm();
        sampler.disarm(); // idempotent

        time.set(5.0);
        assert_eq!(
            sampler.handle(&Event::new(EventKind::Call, &frame("main"))).unwrap(),
            EventOutcome::Ignored
        );
        assert!(log.borrow().samples.is_empty());
    }

    #[test]
    fn test_set_target_swaps_callback() {
        let first = Rc::new(RefCell::new(Recorded::default()));
        let second = Rc::new(RefCell::new(Recorded::default()));
        let (time, timer) = ScriptedTime::new();
        let mut sampler = armed(0.010, timer, &first);
        let main = frame("main");

        time.set(1.0);
        sampler.handle(&Event::new(EventKind::Call, &main)).unwrap();

        sampler.set_target(recording_sink(&second));
        time.set(2.0);
        sampler.handle(&Event::new(EventKind::Call, &main)).unwrap();

        assert_eq!(first.borrow().samples.len(), 1);
        assert_eq!(second.borrow().samples.len(), 1);
    }

    #[test]
    fn test_native_payload_forwarded() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = {
            let seen = Rc::clone(&seen);
            move |_: &dyn RuntimeFrame, _: EventKind, payload: Option<SamplePayload<'_>>| -> anyhow::Result<()> {
                if let Some(SamplePayload::Native(symbol)) = payload {
                    seen.borrow_mut().push(symbol.qualname.clone());
                }
                Ok(())
            }
        };
        let (time, timer) = ScriptedTime::new();
        let mut sampler = Sampler::arm(
            Box::new(sink),
            SamplerConfig {
                interval: 0.010,
                timer: TimerMode::Custom,
                timer_func: Some(timer),
                ..SamplerConfig::default()
            },
        )
        .unwrap();

        let main = frame("main");
        let symbol = NativeSymbol::new("builtins.sorted");
        time.set(1.0);
        sampler.handle(&Event::new(EventKind::NativeReturn, &main).with_native(&symbol)).unwrap();
        assert_eq!(*seen.borrow(), vec!["builtins.sorted".to_string()]);
    }
}
