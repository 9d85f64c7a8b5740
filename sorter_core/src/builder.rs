//! Type-state builder for `SpeedController`.
//!
//! `build()` is only available once both feedback and drive are set. `try_build()`
//! is always available and reports what is missing at runtime.

use std::marker::PhantomData;

use sorter_traits::{Fixed, LineDrive, SpeedFeedback};

use crate::config::ControlCfg;
use crate::controller::SpeedController;
use crate::error::{BuildError, Result};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `SpeedController`. Configuration is validated on build.
pub struct ControllerBuilder<F, D, FS, DS> {
    feedback: Option<F>,
    drive: Option<D>,
    control: Option<ControlCfg>,
    _fs: PhantomData<FS>,
    _ds: PhantomData<DS>,
}

impl<F, D> Default for ControllerBuilder<F, D, Missing, Missing> {
    fn default() -> Self {
        Self {
            feedback: None,
            drive: None,
            control: None,
            _fs: PhantomData,
            _ds: PhantomData,
        }
    }
}

impl<F, D> ControllerBuilder<F, D, Missing, Missing> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<F, D, FS, DS> ControllerBuilder<F, D, FS, DS> {
    pub fn with_feedback(self, feedback: F) -> ControllerBuilder<F, D, Set, DS> {
        ControllerBuilder {
            feedback: Some(feedback),
            drive: self.drive,
            control: self.control,
            _fs: PhantomData,
            _ds: PhantomData,
        }
    }

    pub fn with_drive(self, drive: D) -> ControllerBuilder<F, D, FS, Set> {
        ControllerBuilder {
            feedback: self.feedback,
            drive: Some(drive),
            control: self.control,
            _fs: PhantomData,
            _ds: PhantomData,
        }
    }

    /// Defaults to `ControlCfg::default()` when not set.
    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = Some(control);
        self
    }
}

impl<F: SpeedFeedback, D: LineDrive, FS, DS> ControllerBuilder<F, D, FS, DS> {
    /// Build with runtime checks regardless of type-state.
    pub fn try_build(self) -> Result<SpeedController<F, D>> {
        let feedback = self
            .feedback
            .ok_or_else(|| eyre::Report::new(BuildError::MissingFeedback))?;
        let drive = self
            .drive
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDrive))?;
        validate_and_build(feedback, drive, self.control.unwrap_or_default())
    }
}

impl<F: SpeedFeedback, D: LineDrive> ControllerBuilder<F, D, Set, Set> {
    pub fn build(self) -> Result<SpeedController<F, D>> {
        self.try_build()
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Single place where controller configuration is checked.
fn validate_and_build<F: SpeedFeedback, D: LineDrive>(
    feedback: F,
    drive: D,
    control: ControlCfg,
) -> Result<SpeedController<F, D>> {
    if control.loop_period.is_zero() {
        return Err(invalid("loop_period must be > 0"));
    }
    if control.kp.is_negative() || control.ki.is_negative() || control.kd.is_negative() {
        return Err(invalid("pid gains must be >= 0"));
    }
    if control.integral_limit.is_negative() {
        return Err(invalid("integral_limit must be >= 0"));
    }
    if control.min_output > control.max_output {
        return Err(invalid("min_output must be <= max_output"));
    }
    if control.target_speed < Fixed::ZERO {
        return Err(invalid("target_speed must be >= 0"));
    }
    Ok(SpeedController::from_parts(feedback, drive, control))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{RecordingDrive, ScriptedFeedback};
    use std::time::Duration;

    #[test]
    fn try_build_reports_missing_drive() {
        let err = ControllerBuilder::<ScriptedFeedback, RecordingDrive, _, _>::new()
            .with_feedback(ScriptedFeedback::constant(Fixed::ONE))
            .try_build()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingDrive)
        ));
    }

    #[test]
    fn zero_loop_period_is_rejected() {
        let cfg = ControlCfg {
            loop_period: Duration::ZERO,
            ..ControlCfg::default()
        };
        let err = ControllerBuilder::new()
            .with_feedback(ScriptedFeedback::constant(Fixed::ONE))
            .with_drive(RecordingDrive::default())
            .with_control(cfg)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("loop_period"));
    }
}
