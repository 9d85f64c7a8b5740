pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod sim_ring;

pub use sim_ring::SimulatedRing;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sorter_traits::{CancelToken, Fixed, LineDrive, LineStatus, PortError, SpeedFeedback};

use crate::error::HwError;

#[derive(Debug)]
struct LineModel {
    status: LineStatus,
    commanded: Fixed,
    speed: Fixed,
    response: Fixed,
    fault: Option<i32>,
    timeouts: bool,
    writes: u64,
}

/// Simulated main line drive.
///
/// Clones share one model, so the same line can be handed out as feedback to
/// several readers and as the drive to the controller. Speed follows the
/// commanded value with a first-order response applied once per speed command:
/// `speed += (commanded - speed) * response`.
#[derive(Debug, Clone)]
pub struct SimulatedLine {
    model: Arc<Mutex<LineModel>>,
}

impl Default for SimulatedLine {
    fn default() -> Self {
        Self::new(Fixed::from_raw(200_000))
    }
}

impl SimulatedLine {
    /// `response` is the fraction of the remaining gap closed per command, in `(0, 1]`.
    pub fn new(response: Fixed) -> Self {
        Self {
            model: Arc::new(Mutex::new(LineModel {
                status: LineStatus::Stopped,
                commanded: Fixed::ZERO,
                speed: Fixed::ZERO,
                response: response.clamp_to(Fixed::from_raw(1), Fixed::ONE),
                fault: None,
                timeouts: false,
                writes: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LineModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latch a drive fault; the line coasts to a halt and rejects commands until cleared.
    pub fn inject_fault(&self, code: i32) {
        let mut m = self.lock();
        m.fault = Some(code);
        m.status = LineStatus::Fault;
        m.commanded = Fixed::ZERO;
        tracing::warn!(code, "simulated drive fault injected");
    }

    pub fn clear_fault(&self) {
        let mut m = self.lock();
        m.fault = None;
        m.status = LineStatus::Stopped;
        m.speed = Fixed::ZERO;
    }

    /// Make speed reads time out until turned off again.
    pub fn set_timeouts(&self, on: bool) {
        self.lock().timeouts = on;
    }

    /// Speed without smoothing or error injection.
    pub fn actual_speed(&self) -> Fixed {
        self.lock().speed
    }

    pub fn commanded_speed(&self) -> Fixed {
        self.lock().commanded
    }

    /// Number of accepted speed commands.
    pub fn writes(&self) -> u64 {
        self.lock().writes
    }
}

impl SpeedFeedback for SimulatedLine {
    fn current_speed(&self) -> Result<Fixed, PortError> {
        let m = self.lock();
        if m.timeouts {
            return Err(Box::new(HwError::Timeout));
        }
        Ok(m.speed)
    }

    fn current_status(&self) -> Result<LineStatus, PortError> {
        Ok(self.lock().status)
    }

    fn fault_code(&self) -> Result<Option<i32>, PortError> {
        Ok(self.lock().fault)
    }
}

impl LineDrive for SimulatedLine {
    fn set_target_speed(&mut self, speed: Fixed) -> Result<(), PortError> {
        let mut m = self.lock();
        if let Some(code) = m.fault {
            return Err(Box::new(HwError::DriveFault(code)));
        }
        m.commanded = speed;
        let step = (m.commanded - m.speed) * m.response;
        m.speed += step;
        m.writes += 1;
        tracing::trace!(commanded = %speed, speed = %m.speed, "simulated line command");
        Ok(())
    }

    fn start(&mut self, cancel: &CancelToken) -> Result<(), PortError> {
        if cancel.is_cancelled() {
            return Err(Box::new(HwError::Cancelled));
        }
        let mut m = self.lock();
        if let Some(code) = m.fault {
            return Err(Box::new(HwError::DriveFault(code)));
        }
        m.status = LineStatus::Running;
        tracing::debug!("simulated line started");
        Ok(())
    }

    fn stop(&mut self, _cancel: &CancelToken) -> Result<(), PortError> {
        let mut m = self.lock();
        if m.fault.is_none() {
            m.status = LineStatus::Stopped;
        }
        m.commanded = Fixed::ZERO;
        m.speed = Fixed::ZERO;
        tracing::debug!("simulated line stopped");
        Ok(())
    }

    fn emergency_stop(&mut self) -> Result<(), PortError> {
        let mut m = self.lock();
        if m.fault.is_none() {
            m.status = LineStatus::Stopped;
        }
        m.commanded = Fixed::ZERO;
        m.speed = Fixed::ZERO;
        tracing::warn!("simulated line emergency stop");
        Ok(())
    }
}
