//! Shared background timestamp refresher
//!
//! Many samplers may each want a time source that costs a shared-memory
//! read rather than a syscall per sampled event. A single background
//! thread amortizes the syscall cost: it refreshes one timestamp at the
//! finest interval any subscriber currently needs, and every reader gets
//! it with one atomic load.
//!
//! ## Lifecycle
//!
//! The thread starts on the first `subscribe` and terminates (not merely
//! idles) when the last subscription is released, so processes that enable
//! and disable profiling repeatedly never leak a thread. `subscribe`
//! blocks until the thread has refreshed at least once since the
//! registration, so callers never observe a stale reading.
//!
//! ## Waiting
//!
//! The worker waits on a signal channel with a timeout equal to the
//! effective refresh interval. A wake sent by `subscribe` interrupts the
//! wait so interval changes take effect immediately; queued sends mean a
//! wake arriving mid-refresh is never lost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use crate::clock::{self, ClockMode};
use crate::domain::{SubscriptionId, TimingError};

/// Most subscriptions one thread will track. Bounds memory and keeps the
/// linear table scans cheap.
pub const MAX_SUBSCRIBERS: usize = 1000;

/// Ceiling on the refresh interval; bounds how stale a reading can get.
pub const MAX_REFRESH_INTERVAL: f64 = 1.0;

/// How long `subscribe` waits for the first refresh after registering.
const ACK_TIMEOUT: Duration = Duration::from_secs(1);

type SharedClock = Box<dyn Fn() -> f64 + Send + Sync>;

enum Signal {
    Wake,
    Stop,
}

struct Subscription {
    id: SubscriptionId,
    interval: f64,
}

struct Worker {
    wake_tx: Sender<Signal>,
}

struct State {
    subscriptions: Vec<Subscription>,
    worker: Option<Worker>,
    /// Subscribers blocked until the next refresh.
    waiters: Vec<Sender<()>>,
}

struct Shared {
    state: Mutex<State>,
    /// Bit pattern of the latest `f64` reading. Written by the worker
    /// only, read by arbitrarily many threads without locking.
    time_bits: AtomicU64,
    clock: SharedClock,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh(&self) {
        let reading = (self.clock)();
        self.time_bits.store(reading.to_bits(), Ordering::Release);
        for waiter in self.state().waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

/// The shared timing service. One process-wide instance lives behind
/// [`shared`]; independent instances are constructible for tests.
pub struct TimingThread {
    shared: Arc<Shared>,
}

/// Process-wide shared instance.
pub fn shared() -> &'static TimingThread {
    static SHARED: OnceLock<TimingThread> = OnceLock::new();
    SHARED.get_or_init(TimingThread::new)
}

impl TimingThread {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Box::new(|| clock::now(ClockMode::Precise)))
    }

    /// A timing service driven by `clock` instead of the platform clock.
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    subscriptions: Vec::new(),
                    worker: None,
                    waiters: Vec::new(),
                }),
                time_bits: AtomicU64::new(0),
                clock,
            }),
        }
    }

    /// Register interest in refreshes every `desired_interval` seconds.
    ///
    /// The effective refresh interval becomes the minimum over all live
    /// subscriptions, capped at [`MAX_REFRESH_INTERVAL`]. Starts the
    /// worker thread if none is running and blocks until it has performed
    /// at least one refresh since this registration.
    ///
    /// # Errors
    ///
    /// [`TimingError::TooManySubscribers`] past [`MAX_SUBSCRIBERS`] live
    /// subscriptions, [`TimingError::ThreadSpawn`] if the worker thread
    /// cannot be started.
    pub fn subscribe(&self, desired_interval: f64) -> Result<SubscriptionId, TimingError> {
        let (ack_tx, ack_rx) = bounded(1);
        let id = {
            let mut state = self.shared.state();
            if state.subscriptions.len() >= MAX_SUBSCRIBERS {
                return Err(TimingError::TooManySubscribers { limit: MAX_SUBSCRIBERS });
            }
            if state.worker.is_none() {
                // Seed the reading synchronously so it is never observed
                // stale between spawn and first refresh.
                let reading = (self.shared.clock)();
                self.shared.time_bits.store(reading.to_bits(), Ordering::Release);

                let (wake_tx, wake_rx) = unbounded();
                let shared = Arc::clone(&self.shared);
                thread::Builder::new()
                    .name("stackpulse-timing".into())
                    .spawn(move || run_worker(&shared, &wake_rx))?;
                state.worker = Some(Worker { wake_tx });
                info!("timing thread started");
            }

            let id = next_free_id(&state.subscriptions);
            state.subscriptions.push(Subscription { id, interval: desired_interval });
            state.waiters.push(ack_tx);
            if let Some(worker) = &state.worker {
                let _ = worker.wake_tx.send(Signal::Wake);
            }
            debug!("timing subscription {id} registered at {desired_interval}s");
            id
        };

        if ack_rx.recv_timeout(ACK_TIMEOUT).is_err() {
            warn!("timing thread did not acknowledge a refresh within {ACK_TIMEOUT:?}");
        }
        Ok(id)
    }

    /// Release a subscription. Stops the worker thread when the last one
    /// goes; a later `subscribe` starts a fresh thread.
    ///
    /// # Errors
    ///
    /// [`TimingError::NotSubscribed`] when `id` is not live.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TimingError> {
        let mut state = self.shared.state();
        let Some(index) = state.subscriptions.iter().position(|sub| sub.id == id) else {
            return Err(TimingError::NotSubscribed(id));
        };
        state.subscriptions.swap_remove(index);
        debug!("timing subscription {id} released");

        if state.subscriptions.is_empty() {
            if let Some(worker) = state.worker.take() {
                let _ = worker.wake_tx.send(Signal::Stop);
                info!("timing thread stopping: no subscribers remain");
            }
        }
        Ok(())
    }

    /// Last reading written by the worker. Safe to call when no thread is
    /// running: returns the last value ever written, or 0.0 if the thread
    /// never started.
    #[must_use]
    pub fn current_time(&self) -> f64 {
        f64::from_bits(self.shared.time_bits.load(Ordering::Acquire))
    }

    /// Effective refresh interval, or `None` when no thread is running.
    #[must_use]
    pub fn current_interval(&self) -> Option<f64> {
        let state = self.shared.state();
        state.worker.as_ref()?;
        Some(effective_interval(&state.subscriptions, MAX_REFRESH_INTERVAL))
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.state().worker.is_some()
    }
}

impl Default for TimingThread {
    fn default() -> Self {
        Self::new()
    }
}

fn next_free_id(subscriptions: &[Subscription]) -> SubscriptionId {
    let mut candidate = 0u32;
    while subscriptions.iter().any(|sub| sub.id.0 == candidate) {
        candidate += 1;
    }
    SubscriptionId(candidate)
}

fn effective_interval(subscriptions: &[Subscription], cap: f64) -> f64 {
    subscriptions.iter().map(|sub| sub.interval).fold(cap, f64::min)
}

fn run_worker(shared: &Shared, wake_rx: &Receiver<Signal>) {
    loop {
        let interval = effective_interval(&shared.state().subscriptions, MAX_REFRESH_INTERVAL);
        match wake_rx.recv_timeout(Duration::from_secs_f64(interval.max(0.0))) {
            Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => {
                shared.refresh();
                break;
            }
            Ok(Signal::Wake) | Err(RecvTimeoutError::Timeout) => shared.refresh(),
        }
    }
    debug!("timing thread exited");
}
