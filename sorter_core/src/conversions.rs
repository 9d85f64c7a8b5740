//! `From` implementations bridging `sorter_config` types to `sorter_core` types.

use std::time::Duration;

use crate::config::{ControlCfg, OriginCfg, StabilityCfg};

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&sorter_config::Config> for ControlCfg {
    fn from(c: &sorter_config::Config) -> Self {
        Self {
            target_speed: c.line.target_speed,
            loop_period: Duration::from_millis(c.line.loop_period_ms),
            kp: c.pid.kp,
            ki: c.pid.ki,
            kd: c.pid.kd,
            integral_limit: c.pid.integral_limit,
            min_output: c.line.min_output,
            max_output: c.line.max_output,
        }
    }
}

// ── StabilityCfg ─────────────────────────────────────────────────────────────

impl From<&sorter_config::Config> for StabilityCfg {
    fn from(c: &sorter_config::Config) -> Self {
        Self {
            loop_period: Duration::from_millis(c.line.loop_period_ms),
            target_speed: c.line.target_speed,
            deadband: c.stability.deadband,
            stable_hold: Duration::from_millis(c.stability.stable_hold_ms),
        }
    }
}

// ── OriginCfg ────────────────────────────────────────────────────────────────

impl From<&sorter_config::OriginCfg> for OriginCfg {
    fn from(c: &sorter_config::OriginCfg) -> Self {
        Self {
            poll_period: Duration::from_millis(c.poll_ms),
        }
    }
}
