//! Fan-out of one armed sampler to many profiling sessions
//!
//! A [`StackSampler`] owns at most one armed low-level sampler and a table
//! of subscribers. Each subscriber names a desired sampling interval; the
//! sampler runs at the minimum of them and every subscriber receives every
//! emitted sample. Subscribers bound to an async context additionally get
//! an [`AsyncState`] describing whether the sample came from inside their
//! context, and if not, how execution left it.
//!
//! Subscriber targets run inline on the host program's thread and must not
//! re-enter the `StackSampler` that invoked them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;
use thiserror::Error;

use stackpulse_core::clock::{self, ClockMode};
use stackpulse_core::domain::{ArmError, ClockError, ContextToken, SampleError};
use stackpulse_core::frame::{EventKind, FrameId, NativeSymbol, RuntimeFrame};
use stackpulse_core::sampler::{
    ContextChange, ContextSource, Event, EventOutcome, SamplePayload, SampleSink,
    Sampler, SamplerConfig, TimerFn, TimerMode,
};

/// Identity of one stack-sampler subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber:{}", self.0)
    }
}

#[derive(Error, Debug)]
pub enum SubscribeError {
    #[error("{0} is not a registered subscriber")]
    SubscriberNotFound(SubscriberId),

    #[error("another profiling session is already bound to this context")]
    AsyncContextInUse,

    #[error("async context binding requires a context source")]
    ContextRequired,

    #[error(transparent)]
    Arm(#[from] ArmError),
}

/// A subscriber's relation to its bound context at delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncState {
    /// The sample comes from the subscriber's own context.
    InContext,
    /// Execution left the context through a tracked await; `info` holds
    /// the call stack of that await.
    OutOfContextAwaited { info: Vec<FrameId> },
    /// Execution left the context without a tracked await; `info` holds
    /// the call stack at the moment of the switch.
    OutOfContextUnknown { info: Vec<FrameId> },
}

/// Receives `(stack, elapsed seconds since the previous sample, async
/// state)` for every emitted sample.
pub type SubscriberTarget =
    Box<dyn FnMut(&[FrameId], f64, Option<&AsyncState>) -> anyhow::Result<()>>;

struct Subscriber {
    id: SubscriberId,
    target: SubscriberTarget,
    desired_interval: f64,
    async_bound: bool,
    bound_context: Option<ContextToken>,
    async_state: Option<AsyncState>,
}

struct SharedState {
    subscribers: Vec<Subscriber>,
    /// 0.0 means "no sampling epoch open"; seeded when sampling starts.
    last_profile_time: f64,
    next_id: u64,
}

/// Manages one armed sampler for any number of profiling sessions on a
/// single thread.
pub struct StackSampler {
    state: Rc<RefCell<SharedState>>,
    sampler: Option<Sampler>,
    current_interval: Option<f64>,
    context: Option<Rc<dyn ContextSource>>,
    timer_func: Option<Rc<dyn Fn() -> anyhow::Result<f64>>>,
}

impl StackSampler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SharedState {
                subscribers: Vec::new(),
                last_profile_time: 0.0,
                next_id: 0,
            })),
            sampler: None,
            current_interval: None,
            context: None,
            timer_func: None,
        }
    }

    /// Attach the host's context source, enabling async-bound subscribers
    /// and context-change tracking.
    #[must_use]
    pub fn with_context(mut self, context: Rc<dyn ContextSource>) -> Self {
        self.context = Some(context);
        self
    }

    /// Route all time reads through `timer` instead of the precise clock.
    /// Used to make sampling deterministic.
    #[must_use]
    pub fn with_timer_func(mut self, timer: Rc<dyn Fn() -> anyhow::Result<f64>>) -> Self {
        self.timer_func = Some(timer);
        self
    }

    /// Register a profiling session.
    ///
    /// With `use_async_context`, the session is bound to the context
    /// source's current token; at most one session may be bound to a given
    /// token at a time.
    ///
    /// # Errors
    ///
    /// [`SubscribeError::ContextRequired`] and
    /// [`SubscribeError::AsyncContextInUse`] on bad async binding;
    /// re-arming failures propagate as [`SubscribeError::Arm`].
    pub fn subscribe(
        &mut self,
        target: SubscriberTarget,
        desired_interval: f64,
        use_async_context: bool,
    ) -> Result<SubscriberId, SubscribeError> {
        let bound_context = if use_async_context {
            let source = self.context.as_ref().ok_or(SubscribeError::ContextRequired)?;
            let token = source.current();
            if token.is_some() {
                let state = self.state.borrow();
                if state.subscribers.iter().any(|sub| sub.bound_context == token) {
                    return Err(SubscribeError::AsyncContextInUse);
                }
            }
            token
        } else {
            None
        };

        let id = {
            let mut state = self.state.borrow_mut();
            let id = SubscriberId(state.next_id);
            state.next_id += 1;
            state.subscribers.push(Subscriber {
                id,
                target,
                desired_interval,
                async_bound: use_async_context,
                bound_context,
                async_state: use_async_context.then_some(AsyncState::InContext),
            });
            id
        };
        self.update()?;
        debug!("{id} registered at {desired_interval}s");
        Ok(id)
    }

    /// Remove a profiling session. The last removal disarms the sampler.
    ///
    /// # Errors
    ///
    /// [`SubscribeError::SubscriberNotFound`] for an unknown id.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> Result<(), SubscribeError> {
        {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.subscribers.iter().position(|sub| sub.id == id) else {
                return Err(SubscribeError::SubscriberNotFound(id));
            };
            state.subscribers.remove(index);
        }
        debug!("{id} removed");
        self.update()
    }

    /// Forward one runtime event to the armed sampler.
    ///
    /// # Errors
    ///
    /// Propagates [`SampleError`] from the state machine; the session is
    /// already disarmed when one is returned.
    pub fn handle_event(&mut self, event: &Event<'_>) -> Result<EventOutcome, SampleError> {
        match self.sampler.as_mut() {
            Some(sampler) => sampler.handle(event),
            None => Ok(EventOutcome::Ignored),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.sampler.as_ref().is_some_and(Sampler::is_armed)
    }

    /// Interval the sampler is currently armed at, if any.
    #[must_use]
    pub fn current_interval(&self) -> Option<f64> {
        self.current_interval
    }

    fn update(&mut self) -> Result<(), SubscribeError> {
        let min_interval = {
            let state = self.state.borrow();
            state.subscribers.iter().map(|sub| sub.desired_interval).fold(f64::INFINITY, f64::min)
        };
        if min_interval.is_infinite() {
            self.stop_sampling();
            return Ok(());
        }
        if self.current_interval != Some(min_interval) {
            self.start_sampling(min_interval)?;
        }
        Ok(())
    }

    fn start_sampling(&mut self, interval: f64) -> Result<(), SubscribeError> {
        {
            let mut state = self.state.borrow_mut();
            if state.last_profile_time == 0.0 {
                state.last_profile_time = self
                    .read_time()
                    .map_err(|err| ArmError::from(ClockError::TimerFunction(err)))?;
            }
        }

        let sink = FanOutSink { state: Rc::clone(&self.state), timer: self.timer_func.clone() };
        let config = SamplerConfig {
            interval,
            timer: if self.timer_func.is_some() { TimerMode::Custom } else { TimerMode::Precise },
            timer_func: self.timer_func.clone().map(|timer| -> TimerFn { Box::new(move || timer()) }),
            context: self.context.clone(),
        };
        // Replacing the sampler releases the previous one.
        self.sampler = Some(Sampler::arm(Box::new(sink), config)?);
        self.current_interval = Some(interval);
        debug!("sampling at {interval}s");
        Ok(())
    }

    fn stop_sampling(&mut self) {
        if let Some(mut sampler) = self.sampler.take() {
            sampler.disarm();
        }
        self.current_interval = None;
        self.state.borrow_mut().last_profile_time = 0.0;
    }

    fn read_time(&self) -> anyhow::Result<f64> {
        match &self.timer_func {
            Some(timer) => timer(),
            None => Ok(clock::now(ClockMode::Precise)),
        }
    }
}

impl Default for StackSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// The sampler target: expands samples into whole stacks and delivers
/// them to every subscriber.
struct FanOutSink {
    state: Rc<RefCell<SharedState>>,
    timer: Option<Rc<dyn Fn() -> anyhow::Result<f64>>>,
}

impl SampleSink for FanOutSink {
    fn on_event(
        &mut self,
        frame: &dyn RuntimeFrame,
        kind: EventKind,
        payload: Option<SamplePayload<'_>>,
    ) -> anyhow::Result<()> {
        if let Some(SamplePayload::ContextChange(change)) = payload {
            self.apply_context_change(frame, kind, change);
            return Ok(());
        }

        let now = match &self.timer {
            Some(timer) => timer()?,
            None => clock::now(ClockMode::Precise),
        };
        let native = match payload {
            Some(SamplePayload::Native(symbol)) => Some(symbol),
            _ => None,
        };
        let stack = build_call_stack(Some(frame), kind, native);

        let state = &mut *self.state.borrow_mut();
        let elapsed = now - state.last_profile_time;
        for subscriber in &mut state.subscribers {
            (subscriber.target)(&stack, elapsed, subscriber.async_state.as_ref())?;
        }
        state.last_profile_time = now;
        Ok(())
    }
}

impl FanOutSink {
    fn apply_context_change(&self, frame: &dyn RuntimeFrame, kind: EventKind, change: &ContextChange) {
        let state = &mut *self.state.borrow_mut();
        for subscriber in &mut state.subscribers {
            if !subscriber.async_bound || subscriber.bound_context.is_none() {
                continue;
            }
            if subscriber.bound_context == change.old {
                let mut info = build_call_stack(Some(frame), kind, None);
                if change.await_stack.is_empty() {
                    subscriber.async_state = Some(AsyncState::OutOfContextUnknown { info });
                } else {
                    info.extend(change.await_stack.iter().rev().cloned());
                    subscriber.async_state = Some(AsyncState::OutOfContextAwaited { info });
                }
            } else if subscriber.bound_context == change.new {
                subscriber.async_state = Some(AsyncState::InContext);
            }
        }
    }
}

/// Root-first identity list for the stack ending at `frame`.
///
/// Call events start at the parent so the time is attributed to the
/// caller. Native return/exception events append a synthetic `<built-in>`
/// frame for the foreign callee, which ends up leaf-most. A synthetic
/// thread-identity frame sits at the root.
#[must_use]
pub fn build_call_stack(
    frame: Option<&dyn RuntimeFrame>,
    kind: EventKind,
    native: Option<&NativeSymbol>,
) -> Vec<FrameId> {
    let mut stack = Vec::new();

    if matches!(kind, EventKind::NativeReturn | EventKind::NativeException) {
        if let Some(symbol) = native {
            stack.push(FrameId::native(&symbol.qualname));
        }
    }

    let mut current = match kind {
        EventKind::Call => frame.and_then(RuntimeFrame::parent),
        _ => frame,
    };
    while let Some(live) = current {
        stack.push(FrameId::plain(live.code_name(), live.filename(), live.first_line()));
        current = live.parent();
    }

    stack.push(thread_root());
    stack.reverse();
    stack
}

fn thread_root() -> FrameId {
    let thread = std::thread::current();
    FrameId::plain(thread.name().unwrap_or("<unnamed>"), "<thread>", thread_ordinal())
}

/// Small process-unique integer labelling the current OS thread.
fn thread_ordinal() -> u32 {
    use std::sync::atomic::{AtomicU32, Ordering};
    static NEXT: AtomicU32 = AtomicU32::new(0);
    thread_local! {
        static ORDINAL: u32 = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    ORDINAL.with(|ordinal| *ordinal)
}
