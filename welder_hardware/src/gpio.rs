//! Raspberry Pi GPIO: SSR drive output and trigger push-button input.
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use tracing::{debug, warn};
use welder_traits::{HwResult, Switch};

use crate::error::{HwError, Result};

/// SSR control line. Driven low at construction and on drop.
pub struct GpioSwitch {
    pin: OutputPin,
}

impl GpioSwitch {
    pub fn new(bcm_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(bcm_pin)
            .map_err(|e| HwError::Gpio(format!("ssr pin {bcm_pin}: {e}")))?
            .into_output_low();
        debug!(bcm_pin, "ssr output ready");
        Ok(Self { pin })
    }
}

impl Switch for GpioSwitch {
    fn switch_on(&mut self) -> HwResult<()> {
        self.pin.set_high();
        Ok(())
    }

    fn switch_off(&mut self) -> HwResult<()> {
        self.pin.set_low();
        Ok(())
    }
}

impl Drop for GpioSwitch {
    fn drop(&mut self) {
        self.pin.set_low();
    }
}

/// Trigger button wired to ground with the internal pull-up enabled.
///
/// The callback runs on rppal's interrupt thread and must only record the
/// edge; everything else belongs to the control loop.
pub struct TriggerInput {
    _pin: InputPin,
}

impl TriggerInput {
    pub fn attach<F>(bcm_pin: u8, mut on_edge: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pin = gpio
            .get(bcm_pin)
            .map_err(|e| HwError::Gpio(format!("trigger pin {bcm_pin}: {e}")))?
            .into_input_pullup();
        pin.set_async_interrupt(Trigger::FallingEdge, move |level| {
            if level == Level::Low {
                on_edge();
            }
        })
        .map_err(|e| {
            warn!(bcm_pin, error = %e, "trigger interrupt registration failed");
            HwError::Gpio(e.to_string())
        })?;
        debug!(bcm_pin, "trigger interrupt armed");
        Ok(Self { _pin: pin })
    }
}
