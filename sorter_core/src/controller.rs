//! PID speed controller for the main line.
//!
//! The controller does not own a timer: a scheduler calls
//! [`SpeedController::execute_control_tick`] once per configured loop period and
//! that period is the `dt` of the PID. All arithmetic is `Fixed`, so outputs are
//! reproducible to the last decimal.
//!
//! Expected operational failures never panic or return `Err`: start/stop report a
//! `bool`, ticks report a [`TickStatus`], and a drive fault stops the controller.

use std::sync::{Mutex, MutexGuard, PoisonError};

use sorter_traits::{CancelToken, Fixed, LineDrive, SpeedFeedback};

use crate::config::ControlCfg;
use crate::fixed_point::WideAccumulator;
use crate::hw_error::map_hw_error;
use crate::status::TickStatus;
use crate::util::period_seconds;

/// Diagnostic view of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub running: bool,
    pub target: Fixed,
    pub last_output: Option<Fixed>,
    pub integral: Fixed,
}

struct ControllerState<D> {
    drive: D,
    running: bool,
    target: Fixed,
    last_applied: Option<Fixed>,
    integral: WideAccumulator,
    prev_error: Fixed,
    last_output: Option<Fixed>,
}

pub struct SpeedController<F: SpeedFeedback, D: LineDrive> {
    feedback: F,
    cfg: ControlCfg,
    dt: Fixed,
    state: Mutex<ControllerState<D>>,
}

impl<F: SpeedFeedback, D: LineDrive> core::fmt::Debug for SpeedController<F, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = self.lock();
        f.debug_struct("SpeedController")
            .field("running", &s.running)
            .field("target", &s.target)
            .field("last_output", &s.last_output)
            .field("integral", &s.integral.to_fixed())
            .finish()
    }
}

impl<F: SpeedFeedback, D: LineDrive> SpeedController<F, D> {
    /// Use [`crate::ControllerBuilder`] for validated construction.
    pub(crate) fn from_parts(feedback: F, drive: D, cfg: ControlCfg) -> Self {
        let dt = period_seconds(cfg.loop_period);
        let target = cfg.target_speed;
        Self {
            feedback,
            cfg,
            dt,
            state: Mutex::new(ControllerState {
                drive,
                running: false,
                target,
                last_applied: None,
                integral: WideAccumulator::ZERO,
                prev_error: Fixed::ZERO,
                last_output: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState<D>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ControlCfg {
        &self.cfg
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn target_speed(&self) -> Fixed {
        self.lock().target
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let s = self.lock();
        ControllerSnapshot {
            running: s.running,
            target: s.target,
            last_output: s.last_output,
            integral: s.integral.to_fixed(),
        }
    }

    /// Start the line. Rejected if already running; the running flag only flips
    /// when the drive accepted the start.
    pub fn start(&self, cancel: &CancelToken) -> bool {
        let mut s = self.lock();
        if s.running {
            tracing::debug!("start rejected: controller already running");
            return false;
        }
        s.integral = WideAccumulator::ZERO;
        s.prev_error = Fixed::ZERO;
        match s.drive.start(cancel) {
            Ok(()) => {
                s.running = true;
                tracing::info!(target_speed = %s.target, "speed controller started");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "drive start failed");
                false
            }
        }
    }

    /// Stop the line. Rejected if not running. The controller stops regardless of
    /// the drive's answer; the return value reports that answer.
    pub fn stop(&self, cancel: &CancelToken) -> bool {
        let mut s = self.lock();
        if !s.running {
            tracing::debug!("stop rejected: controller not running");
            return false;
        }
        let outcome = s.drive.stop(cancel);
        s.running = false;
        match outcome {
            Ok(()) => {
                tracing::info!("speed controller stopped");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "drive stop failed; controller stopped anyway");
                false
            }
        }
    }

    /// Always forwarded to the drive, running or not.
    pub fn emergency_stop(&self) -> bool {
        let mut s = self.lock();
        let outcome = s.drive.emergency_stop();
        s.running = false;
        match outcome {
            Ok(()) => {
                tracing::warn!("emergency stop");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "drive emergency stop failed");
                false
            }
        }
    }

    /// Returns `false` when `target` equals the last applied target.
    pub fn set_target_speed(&self, target: Fixed) -> bool {
        let mut s = self.lock();
        if s.last_applied == Some(target) {
            return false;
        }
        s.target = target;
        s.last_applied = Some(target);
        tracing::debug!(target_speed = %target, "target speed updated");
        true
    }

    /// One PID iteration: read, compute, clamp, command.
    pub fn execute_control_tick(&self) -> TickStatus {
        let mut s = self.lock();
        if !s.running {
            return TickStatus::Idle;
        }

        // Fault first: a faulted drive may also fail speed reads.
        match self.feedback.fault_code() {
            Ok(Some(code)) => {
                s.running = false;
                tracing::error!(code, "drive reported fault; speed controller stopped");
                return TickStatus::Faulted { code };
            }
            Ok(None) => {}
            Err(e) => {
                let err = map_hw_error(&*e);
                tracing::warn!(error = %err, "fault code read failed");
                return TickStatus::Failed(err);
            }
        }
        let feedback = match self.feedback.current_speed() {
            Ok(v) => v,
            Err(e) => {
                let err = map_hw_error(&*e);
                tracing::warn!(error = %err, "speed feedback read failed");
                return TickStatus::Failed(err);
            }
        };

        let cfg = &self.cfg;
        let error = s.target - feedback;
        let proportional = cfg.kp * error;

        let limit = cfg.integral_limit;
        s.integral = s.integral.add_product(error, self.dt).clamp_abs(limit);
        let integral = s.integral.scaled_by(cfg.ki);

        let slope = (error - s.prev_error)
            .checked_div(self.dt)
            .unwrap_or(Fixed::ZERO);
        let derivative = cfg.kd * slope;
        s.prev_error = error;

        let output =
            (s.target + proportional + integral + derivative).clamp_to(cfg.min_output, cfg.max_output);
        s.last_output = Some(output);

        tracing::trace!(
            feedback = %feedback,
            error = %error,
            output = %output,
            "control tick"
        );

        if let Err(e) = s.drive.set_target_speed(output) {
            let err = map_hw_error(&*e);
            tracing::warn!(error = %err, output = %output, "drive write failed");
            return TickStatus::Failed(err);
        }
        TickStatus::Commanded {
            output,
            feedback,
            error,
        }
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    /// Run `f` against the drive under the controller lock.
    ///
    /// `f` must not call back into this controller: the lock is not reentrant
    /// and any controller method called from `f` deadlocks.
    pub fn with_drive<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&self.lock().drive)
    }
}
