pub mod clock;
pub mod fixed;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use fixed::Fixed;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub type PortError = Box<dyn std::error::Error + Send + Sync>;

/// Drive-reported state of the main line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Fault,
}

/// Read side of the main line drive. Shared between the estimator, the controller
/// and diagnostics, hence `&self`.
pub trait SpeedFeedback {
    fn current_speed(&self) -> Result<Fixed, PortError>;
    fn current_status(&self) -> Result<LineStatus, PortError>;
    fn fault_code(&self) -> Result<Option<i32>, PortError>;
}

/// Write side of the main line drive.
pub trait LineDrive {
    fn set_target_speed(&mut self, speed: Fixed) -> Result<(), PortError>;
    fn start(&mut self, cancel: &CancelToken) -> Result<(), PortError>;
    fn stop(&mut self, cancel: &CancelToken) -> Result<(), PortError>;
    fn emergency_stop(&mut self) -> Result<(), PortError>;
}

/// Levels of the two origin photo-sensors; `true` means blocked.
pub trait OriginSensors {
    fn read_levels(&mut self) -> Result<(bool, bool), PortError>;
}

impl<F: SpeedFeedback + ?Sized> SpeedFeedback for Arc<F> {
    fn current_speed(&self) -> Result<Fixed, PortError> {
        (**self).current_speed()
    }
    fn current_status(&self) -> Result<LineStatus, PortError> {
        (**self).current_status()
    }
    fn fault_code(&self) -> Result<Option<i32>, PortError> {
        (**self).fault_code()
    }
}

impl<D: LineDrive + ?Sized> LineDrive for Box<D> {
    fn set_target_speed(&mut self, speed: Fixed) -> Result<(), PortError> {
        (**self).set_target_speed(speed)
    }
    fn start(&mut self, cancel: &CancelToken) -> Result<(), PortError> {
        (**self).start(cancel)
    }
    fn stop(&mut self, cancel: &CancelToken) -> Result<(), PortError> {
        (**self).stop(cancel)
    }
    fn emergency_stop(&mut self) -> Result<(), PortError> {
        (**self).emergency_stop()
    }
}

impl<S: OriginSensors + ?Sized> OriginSensors for Box<S> {
    fn read_levels(&mut self) -> Result<(bool, bool), PortError> {
        (**self).read_levels()
    }
}

/// Cooperative cancellation flag forwarded to drive operations. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing shutdown flag (e.g. one set by a signal handler).
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
