//! Fixed-cadence scheduler for the speed controller.
//!
//! The controller itself owns no timer; this loop calls
//! `execute_control_tick` once per loop period and paces against absolute
//! deadlines so a slow tick does not accumulate drift.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sorter_traits::{Clock, Fixed, LineDrive, SpeedFeedback};

use crate::controller::SpeedController;
use crate::status::TickStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown flag was raised.
    Shutdown,
    /// The drive reported a fault and the controller stopped itself.
    Fault { code: i32 },
    /// The controller was not running (never started or stopped elsewhere).
    NotRunning,
    /// `max_duration` elapsed.
    Deadline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub commanded: u64,
    /// Ticks that ended in `Failed` (port errors).
    pub failures: u64,
    pub faults: u64,
    pub last_output: Option<Fixed>,
    pub stop_reason: StopReason,
}

/// Tick `controller` every loop period until shutdown, a fault, or
/// `max_duration`. `on_tick` runs after each tick on the loop thread.
pub fn run_control_loop<F, D, C>(
    controller: &SpeedController<F, D>,
    clock: &C,
    shutdown: &AtomicBool,
    max_duration: Option<Duration>,
    mut on_tick: impl FnMut(&TickStatus),
) -> LoopStats
where
    F: SpeedFeedback,
    D: LineDrive,
    C: Clock + ?Sized,
{
    let period = controller.config().loop_period.max(Duration::from_micros(1));
    let started = clock.now();
    let mut next = started;
    let mut stats = LoopStats {
        ticks: 0,
        commanded: 0,
        failures: 0,
        faults: 0,
        last_output: None,
        stop_reason: StopReason::NotRunning,
    };
    tracing::info!(period = ?period, "control loop started");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            stats.stop_reason = StopReason::Shutdown;
            break;
        }
        let elapsed = clock.now().saturating_duration_since(started);
        if max_duration.is_some_and(|max| elapsed >= max) {
            stats.stop_reason = StopReason::Deadline;
            break;
        }
        if !controller.is_running() {
            stats.stop_reason = StopReason::NotRunning;
            break;
        }

        let status = controller.execute_control_tick();
        stats.ticks += 1;
        match &status {
            TickStatus::Commanded { output, .. } => {
                stats.commanded += 1;
                stats.last_output = Some(*output);
            }
            TickStatus::Failed(_) => stats.failures += 1,
            TickStatus::Faulted { .. } | TickStatus::Idle => {}
        }
        on_tick(&status);
        if let TickStatus::Faulted { code } = status {
            stats.faults += 1;
            stats.stop_reason = StopReason::Fault { code };
            break;
        }

        next += period;
        let now = clock.now();
        if next > now {
            clock.sleep(next - now);
        } else {
            // Overran; resynchronize instead of bursting to catch up.
            next = now;
        }
    }

    tracing::info!(
        ticks = stats.ticks,
        faults = stats.faults,
        reason = ?stats.stop_reason,
        "control loop finished"
    );
    stats
}
