//! Smoothed line speed and stability judgement.
//!
//! Sampling is driven by reads: every call to [`SpeedEstimator::current_speed`]
//! or [`SpeedEstimator::is_speed_stable`] pulls exactly one sample from the
//! feedback port, pushes it into a bounded FIFO and averages the window. A caller
//! reading at a fixed cadence is therefore also the sampler.
//!
//! Stability uses a dead-band with a minimum dwell: the line is stable only once
//! the smoothed speed has stayed within `deadband` of the target for at least
//! `stable_hold`. Any excursion restarts the dwell from zero.
//!
//! All state sits behind one mutex; the estimator is read concurrently by the
//! control loop, health checks and telemetry.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use sorter_traits::{Clock, Fixed, MonotonicClock, SpeedFeedback};

use crate::config::StabilityCfg;
use crate::error::Result;
use crate::fixed_point::{abs_diff, mean};
use crate::hw_error::map_hw_error;
use crate::util::smoothing_window_len;

#[derive(Debug)]
struct EstimatorState {
    window: VecDeque<Fixed>,
    capacity: usize,
    target: Fixed,
    deadband: Fixed,
    stable_hold: Duration,
    currently_stable: bool,
    stable_since: Option<Instant>,
    last_smoothed: Option<Fixed>,
}

impl EstimatorState {
    fn push(&mut self, sample: Fixed) -> Fixed {
        self.window.push_back(sample);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
        // Window holds at least the sample just pushed.
        let smoothed = mean(self.window.iter().copied()).unwrap_or(sample);
        self.last_smoothed = Some(smoothed);
        smoothed
    }
}

/// Point-in-time view that does not take a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatorSnapshot {
    pub samples: usize,
    pub capacity: usize,
    pub target: Fixed,
    pub last_smoothed: Option<Fixed>,
    pub currently_stable: bool,
    pub stable_since: Option<Instant>,
}

pub struct SpeedEstimator<F: SpeedFeedback> {
    feedback: F,
    clock: Arc<dyn Clock + Send + Sync>,
    state: Mutex<EstimatorState>,
}

impl<F: SpeedFeedback> core::fmt::Debug for SpeedEstimator<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = self.lock();
        f.debug_struct("SpeedEstimator")
            .field("capacity", &s.capacity)
            .field("samples", &s.window.len())
            .field("last_smoothed", &s.last_smoothed)
            .field("currently_stable", &s.currently_stable)
            .finish()
    }
}

impl<F: SpeedFeedback> SpeedEstimator<F> {
    pub fn new(feedback: F, cfg: &StabilityCfg) -> Self {
        Self::with_clock(feedback, cfg, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(feedback: F, cfg: &StabilityCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let capacity = smoothing_window_len(cfg.loop_period);
        Self {
            feedback,
            clock,
            state: Mutex::new(EstimatorState {
                window: VecDeque::with_capacity(capacity + 1),
                capacity,
                target: cfg.target_speed,
                deadband: cfg.deadband,
                stable_hold: cfg.stable_hold,
                currently_stable: false,
                stable_since: None,
                last_smoothed: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EstimatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sample(&self, state: &mut EstimatorState) -> Result<Fixed> {
        let raw = self
            .feedback
            .current_speed()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading line speed")?;
        Ok(state.push(raw))
    }

    /// Smoothing window capacity in samples.
    pub fn window_len(&self) -> usize {
        self.lock().capacity
    }

    /// Take one sample and return the moving average of the window.
    pub fn current_speed(&self) -> Result<Fixed> {
        let mut s = self.lock();
        self.sample(&mut s)
    }

    /// Take one sample and judge stability with dead-band and dwell.
    pub fn is_speed_stable(&self) -> Result<bool> {
        let mut s = self.lock();
        let smoothed = self.sample(&mut s)?;
        let now = self.clock.now();

        let in_band = abs_diff(smoothed, s.target) <= s.deadband;
        if in_band && !s.currently_stable {
            s.stable_since = Some(now);
            tracing::debug!(smoothed = %smoothed, target = %s.target, "speed entered dead-band");
        } else if !in_band && s.currently_stable {
            s.stable_since = None;
            tracing::debug!(smoothed = %smoothed, target = %s.target, "speed left dead-band");
        }
        s.currently_stable = in_band;

        Ok(match s.stable_since {
            Some(since) if in_band => now.saturating_duration_since(since) >= s.stable_hold,
            _ => false,
        })
    }

    /// Clear the sample window and all stability bookkeeping.
    pub fn reset_smoothing(&self) {
        let mut s = self.lock();
        s.window.clear();
        s.currently_stable = false;
        s.stable_since = None;
        s.last_smoothed = None;
    }

    /// Change the speed stability is judged against. Does not reset smoothing.
    pub fn set_target_speed(&self, target: Fixed) {
        self.lock().target = target;
    }

    /// Inspect without sampling.
    pub fn snapshot(&self) -> EstimatorSnapshot {
        let s = self.lock();
        EstimatorSnapshot {
            samples: s.window.len(),
            capacity: s.capacity,
            target: s.target,
            last_smoothed: s.last_smoothed,
            currently_stable: s.currently_stable,
            stable_since: s.stable_since,
        }
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ScriptedFeedback;
    use sorter_traits::ManualClock;

    fn fx(s: &str) -> Fixed {
        s.parse().unwrap()
    }

    fn cfg() -> StabilityCfg {
        StabilityCfg {
            loop_period: Duration::from_millis(100),
            target_speed: fx("2"),
            deadband: fx("0.05"),
            stable_hold: Duration::from_millis(300),
        }
    }

    #[test]
    fn window_tracks_loop_period() {
        let est = SpeedEstimator::new(ScriptedFeedback::constant(fx("1")), &cfg());
        assert_eq!(est.window_len(), 10);
    }

    #[test]
    fn each_read_takes_one_sample() {
        let fb = ScriptedFeedback::new([fx("1"), fx("2"), fx("3")]);
        let est = SpeedEstimator::new(fb, &cfg());
        assert_eq!(est.current_speed().unwrap(), fx("1"));
        assert_eq!(est.current_speed().unwrap(), fx("1.5"));
        let _ = est.is_speed_stable().unwrap();
        assert_eq!(est.snapshot().samples, 3);
        assert_eq!(est.feedback().reads(), 3);
    }

    #[test]
    fn snapshot_does_not_sample() {
        let fb = ScriptedFeedback::constant(fx("2"));
        let est = SpeedEstimator::new(fb, &cfg());
        let _ = est.snapshot();
        assert_eq!(est.feedback().reads(), 0);
    }

    #[test]
    fn stability_needs_dwell() {
        let clock = ManualClock::new();
        let est = SpeedEstimator::with_clock(
            ScriptedFeedback::constant(fx("2.01")),
            &cfg(),
            Arc::new(clock.clone()),
        );
        assert!(!est.is_speed_stable().unwrap());
        clock.advance(Duration::from_millis(200));
        assert!(!est.is_speed_stable().unwrap());
        clock.advance(Duration::from_millis(100));
        assert!(est.is_speed_stable().unwrap());
    }
}
