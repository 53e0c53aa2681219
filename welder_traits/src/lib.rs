pub mod clock;

pub use clock::{Clock, MonotonicClock};
#[cfg(feature = "test-clock")]
pub use clock::TestClock;

use std::time::Duration;

/// Error type used at every hardware trait boundary.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Analog input channels exposed by the sensor front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Scaled, offset mains voltage (ZMPT-style transformer output).
    Voltage,
    /// Current transformer / shunt output.
    Current,
}

/// One RMS measurement over a window of mains cycles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PowerReading {
    pub voltage_rms: f32,
    pub current_rms: f32,
}

impl PowerReading {
    pub fn new(voltage_rms: f32, current_rms: f32) -> Self {
        Self {
            voltage_rms,
            current_rms,
        }
    }

    /// Apparent power V·I in watts. Non-finite or negative products read as 0.
    pub fn power_w(&self) -> f32 {
        let p = self.voltage_rms * self.current_rms;
        if p.is_finite() && p > 0.0 { p } else { 0.0 }
    }
}

/// The switching element (SSR or relay) gating welding current.
pub trait Switch {
    fn switch_on(&mut self) -> HwResult<()>;
    fn switch_off(&mut self) -> HwResult<()>;
}

/// Instantaneous raw ADC sample source.
pub trait SampleSource {
    fn sample_instant(&mut self, channel: Channel) -> HwResult<i32>;
}

/// RMS voltage/current measurement. Blocks for roughly `window`.
pub trait PowerMeter {
    fn measure(&mut self, window: Duration) -> HwResult<PowerReading>;
}

impl<T: Switch + ?Sized> Switch for Box<T> {
    fn switch_on(&mut self) -> HwResult<()> {
        (**self).switch_on()
    }
    fn switch_off(&mut self) -> HwResult<()> {
        (**self).switch_off()
    }
}

impl<T: SampleSource + ?Sized> SampleSource for Box<T> {
    fn sample_instant(&mut self, channel: Channel) -> HwResult<i32> {
        (**self).sample_instant(channel)
    }
}

impl<T: PowerMeter + ?Sized> PowerMeter for Box<T> {
    fn measure(&mut self, window: Duration) -> HwResult<PowerReading> {
        (**self).measure(window)
    }
}
