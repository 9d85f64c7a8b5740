//! Origin photo-sensors on Raspberry Pi GPIO.

use rppal::gpio::{Gpio, InputPin};
use sorter_traits::{OriginSensors, PortError};

use crate::error::{HwError, Result};

pub struct GpioOriginSensors {
    first: InputPin,
    second: InputPin,
    active_low: bool,
}

impl GpioOriginSensors {
    /// `active_low` sensors pull the line low while blocked.
    pub fn new(first_pin: u8, second_pin: u8, active_low: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = |n: u8| -> Result<InputPin> {
            let p = gpio.get(n).map_err(|e| HwError::Gpio(format!("pin {n}: {e}")))?;
            Ok(if active_low {
                p.into_input_pullup()
            } else {
                p.into_input_pulldown()
            })
        };
        let first = pin(first_pin)?;
        let second = pin(second_pin)?;
        tracing::info!(first_pin, second_pin, active_low, "origin sensors on gpio");
        Ok(Self {
            first,
            second,
            active_low,
        })
    }

    fn blocked(&self, pin: &InputPin) -> bool {
        pin.is_low() == self.active_low
    }
}

impl OriginSensors for GpioOriginSensors {
    fn read_levels(&mut self) -> std::result::Result<(bool, bool), PortError> {
        Ok((self.blocked(&self.first), self.blocked(&self.second)))
    }
}
