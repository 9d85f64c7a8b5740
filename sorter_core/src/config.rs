//! Runtime configuration types for the control core.
//!
//! These are the structs consumed by `SpeedController`, `SpeedEstimator` and the
//! origin monitor. They are separate from the TOML-deserialized config in `sorter_config`.

use std::time::Duration;

use sorter_traits::Fixed;

/// PID speed control configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCfg {
    /// Initial target speed.
    pub target_speed: Fixed,
    /// Control tick period; `dt` of the PID.
    pub loop_period: Duration,
    pub kp: Fixed,
    pub ki: Fixed,
    pub kd: Fixed,
    /// Integral accumulator is clamped to `[-integral_limit, integral_limit]`.
    pub integral_limit: Fixed,
    /// Commanded speed is clamped to `[min_output, max_output]`.
    pub min_output: Fixed,
    pub max_output: Fixed,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            target_speed: Fixed::from_int(2),
            loop_period: Duration::from_millis(100),
            kp: Fixed::from_raw(500_000),
            ki: Fixed::from_raw(100_000),
            kd: Fixed::ZERO,
            integral_limit: Fixed::from_int(10),
            min_output: Fixed::ZERO,
            max_output: Fixed::from_int(3),
        }
    }
}

/// Smoothing and stability configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilityCfg {
    /// Sizes the smoothing window (about one second of samples).
    pub loop_period: Duration,
    /// Speed the line is judged against.
    pub target_speed: Fixed,
    /// `|smoothed - target| <= deadband` counts as on target.
    pub deadband: Fixed,
    /// Continuous time on target before the line is reported stable.
    pub stable_hold: Duration,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            loop_period: Duration::from_millis(100),
            target_speed: Fixed::from_int(2),
            deadband: Fixed::from_raw(50_000),
            stable_hold: Duration::from_secs(2),
        }
    }
}

/// Origin sensor polling configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginCfg {
    /// Cadence at which sensor levels are sampled.
    pub poll_period: Duration,
}

impl Default for OriginCfg {
    fn default() -> Self {
        Self {
            poll_period: Duration::from_millis(10),
        }
    }
}
