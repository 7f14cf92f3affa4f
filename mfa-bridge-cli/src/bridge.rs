//! The bridge run loop
//!
//! Source I/O runs on its own thread and hands snapshots to the
//! resolution loop through a bounded(1) channel: a snapshot produced
//! while the previous one is still being resolved makes the producer
//! wait, so resolutions never interleave. The consumer owns the serial
//! port exclusively and also drives the blink cadence — the device
//! protocol carries no timing, so lit-state toggles are re-evaluated
//! every tick even when no fresh snapshot arrived.
//!
//! The source's blocking calls all carry timeouts no longer than one
//! polling interval, which is what makes a shutdown request take effect
//! within one interval.

use crate::serial::PanelPort;
use anyhow::{Context, Result};
use crossbeam_channel::{bounded, RecvTimeoutError};
use mfa_bridge::{BridgeError, CommandEncoder, PhaseClock, Profile, ResolutionEngine, SignalSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Consecutive transport failures before the producer gives up and the
/// outer reconnect loop takes over
const MAX_CONSECUTIVE_FAILURES: u32 = 30;

/// Events flowing from the source thread to the resolution loop
enum SourceEvent {
    Snapshot(mfa_bridge::SignalSnapshot),
    /// The producer stopped for good (auth rejection, persistent
    /// transport failure); the loop must go dark and surface this
    Fatal(BridgeError),
}

/// Outcome of one bridge session
pub enum SessionEnd {
    /// Operator-requested shutdown; do not reconnect
    Shutdown,
    /// Source died with a retryable error; reconnect with backoff
    SourceLost(BridgeError),
}

/// Run one bridge session until shutdown or source loss.
///
/// The panel receives the full state on the first tick (fresh encoder)
/// and an `OFF` frame on every exit path.
pub fn run(
    source: Box<dyn SignalSource + Send>,
    profile: &Profile,
    port: &mut PanelPort,
    shutdown: &Arc<AtomicBool>,
) -> Result<SessionEnd> {
    let tick = tick_interval(profile);
    log::info!(
        "Bridge running: {} mappings, tick {:?}",
        profile.mappings.len(),
        tick
    );

    let (tx, rx) = bounded::<SourceEvent>(1);
    let producer_shutdown = Arc::clone(shutdown);
    let producer = thread::Builder::new()
        .name("signal-source".into())
        .spawn(move || produce(source, &tx, &producer_shutdown))
        .context("Failed to spawn the signal source thread")?;

    let engine = ResolutionEngine::new();
    let clock = PhaseClock::new();
    let mut encoder = CommandEncoder::new();
    let mut effects = engine.resolve(&mfa_bridge::SignalSnapshot::new(), profile);

    let result = loop {
        if shutdown.load(Ordering::SeqCst) {
            break Ok(SessionEnd::Shutdown);
        }
        match rx.recv_timeout(tick) {
            Ok(SourceEvent::Snapshot(snapshot)) => {
                effects = engine.resolve(&snapshot, profile);
            }
            Ok(SourceEvent::Fatal(e)) if e.is_retryable() => {
                break Ok(SessionEnd::SourceLost(e));
            }
            Ok(SourceEvent::Fatal(e)) => {
                // Non-retryable (bad credential): dark panel, then up
                let _ = port.send(encoder.all_off());
                let _ = producer.join();
                return Err(e.into());
            }
            Err(RecvTimeoutError::Timeout) => {
                // No fresh data; the blink phase still advances
            }
            Err(RecvTimeoutError::Disconnected) => {
                break Ok(SessionEnd::SourceLost(BridgeError::Transport(
                    "Source thread exited".into(),
                )));
            }
        }

        let lit = clock.lit_states(&effects);
        let mut write_failed = false;
        for frame in encoder.encode(&lit) {
            if let Err(e) = port.send(frame) {
                log::error!("{:#}", e);
                write_failed = true;
                break;
            }
        }
        if write_failed {
            break Ok(SessionEnd::SourceLost(BridgeError::Transport(
                "Serial write failed".into(),
            )));
        }
    };

    // Fail-safe dark state on every exit path; best effort since the
    // port itself may be the casualty. Dropping the receiver first
    // unblocks a producer stuck mid-send.
    drop(rx);
    let _ = port.send(encoder.all_off());
    let _ = producer.join();
    result
}

/// Tick interval: the profile's polling cadence, clamped so lit states
/// are re-sent at least twice per fastest blink half-period (no visible
/// stutter at phase boundaries).
fn tick_interval(profile: &Profile) -> Duration {
    let fastest_blink = profile
        .mappings
        .iter()
        .filter_map(|m| m.effect.blink_interval())
        .min();
    let mut ms = profile.poll.interval_ms;
    if let Some(blink) = fastest_blink {
        ms = ms.min(u64::from(blink) / 2);
    }
    Duration::from_millis(ms.max(10))
}

/// Producer loop: poll, forward, back off on transport trouble.
///
/// Protocol and frame errors skip the tick; transport errors retry with
/// a growing capped delay; an auth rejection or too many consecutive
/// failures end the session.
fn produce(
    mut source: Box<dyn SignalSource + Send>,
    tx: &crossbeam_channel::Sender<SourceEvent>,
    shutdown: &AtomicBool,
) {
    log::info!("Polling {}", source.describe());
    let mut consecutive_failures: u32 = 0;

    while !shutdown.load(Ordering::SeqCst) {
        match source.poll() {
            Ok(snapshot) => {
                consecutive_failures = 0;
                // Blocks while the consumer is mid-resolution: waiting is
                // the designed behavior, snapshots never interleave
                if tx.send(SourceEvent::Snapshot(snapshot)).is_err() {
                    return;
                }
            }
            Err(e @ BridgeError::Auth(_)) => {
                log::error!("{}", e);
                let _ = tx.send(SourceEvent::Fatal(e));
                return;
            }
            Err(BridgeError::Protocol(e)) => {
                log::warn!("Skipping tick: {}", e);
            }
            Err(BridgeError::Frame(e)) => {
                log::warn!("Skipping frame: {}", e);
            }
            Err(e) => {
                consecutive_failures += 1;
                if consecutive_failures == 1 {
                    log::warn!("Source unstable, retrying: {}", e);
                }
                if consecutive_failures > MAX_CONSECUTIVE_FAILURES {
                    log::error!("Giving up after {} failures", consecutive_failures);
                    let _ = tx.send(SourceEvent::Fatal(e));
                    return;
                }
                let backoff =
                    Duration::from_millis(200 * u64::from(consecutive_failures)).min(Duration::from_secs(3));
                thread::sleep(backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfa_bridge::mapping::{Condition, Effect, Mapping, PollSettings};
    use mfa_bridge::Indicator;

    fn profile_with(mappings: Vec<Mapping>, interval_ms: u64) -> Profile {
        Profile {
            name: "test".into(),
            description: String::new(),
            vehicle_classes: vec![],
            mappings,
            poll: PollSettings { interval_ms },
        }
    }

    #[test]
    fn test_tick_clamps_to_half_the_fastest_blink() {
        let blinky = Mapping::new(
            "fast blink",
            Indicator::Pzb85,
            Condition::is_true("x"),
            Effect::Blink(100),
        );
        let profile = profile_with(vec![blinky], 500);
        assert_eq!(tick_interval(&profile), Duration::from_millis(50));
    }

    #[test]
    fn test_tick_uses_poll_interval_without_blink_mappings() {
        let steady = Mapping::new(
            "steady",
            Indicator::Sifa,
            Condition::is_true("x"),
            Effect::On,
        );
        let profile = profile_with(vec![steady], 80);
        assert_eq!(tick_interval(&profile), Duration::from_millis(80));
    }

    #[test]
    fn test_tick_has_a_floor() {
        let blinky = Mapping::new(
            "absurd blink",
            Indicator::Pzb85,
            Condition::is_true("x"),
            Effect::Blink(2),
        );
        let profile = profile_with(vec![blinky], 50);
        assert_eq!(tick_interval(&profile), Duration::from_millis(10));
    }
}
