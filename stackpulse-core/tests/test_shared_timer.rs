//! End-to-end check of the shared-thread timer mode against the
//! process-wide timing service. Kept in one test function so nothing else
//! races the singleton's lifecycle.

use std::thread;
use std::time::Duration;

use stackpulse_core::frame::{EventKind, FrameSnapshot, RuntimeFrame};
use stackpulse_core::sampler::{Event, EventOutcome, SamplePayload, Sampler, SamplerConfig, TimerMode};
use stackpulse_core::timing;

#[test]
fn test_shared_thread_mode_lifecycle() {
    let sink = |_: &dyn RuntimeFrame, _: EventKind, _: Option<SamplePayload<'_>>| -> anyhow::Result<()> {
        Ok(())
    };
    let mut sampler = Sampler::arm(
        Box::new(sink),
        SamplerConfig { interval: 0.001, timer: TimerMode::SharedThread, ..SamplerConfig::default() },
    )
    .expect("failed to arm with the shared timing thread");

    // Arming subscribed us at the sampling interval.
    assert!(timing::shared().is_running());
    assert_eq!(timing::shared().current_interval(), Some(0.001));

    // After well over one interval the shared reading must have advanced
    // past the seed, so the next event samples.
    thread::sleep(Duration::from_millis(20));
    let main = FrameSnapshot::new("main", "main.py", 1);
    let outcome = sampler.handle(&Event::new(EventKind::Call, &main)).unwrap();
    assert_eq!(outcome, EventOutcome::Sampled);

    // Disarming releases the subscription and stops the thread.
    sampler.disarm();
    assert!(!timing::shared().is_running());

    // A fresh session restarts it.
    let sink = |_: &dyn RuntimeFrame, _: EventKind, _: Option<SamplePayload<'_>>| -> anyhow::Result<()> {
        Ok(())
    };
    let sampler = Sampler::arm(
        Box::new(sink),
        SamplerConfig { interval: 0.002, timer: TimerMode::SharedThread, ..SamplerConfig::default() },
    )
    .unwrap();
    assert!(timing::shared().is_running());
    assert_eq!(timing::shared().current_interval(), Some(0.002));

    // Dropping the sampler releases the subscription too.
    drop(sampler);
    assert!(!timing::shared().is_running());
}
