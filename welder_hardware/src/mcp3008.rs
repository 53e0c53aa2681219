//! MCP3008 10-bit SPI ADC carrying the voltage and current sensor outputs.
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::trace;
use welder_traits::{Channel, HwResult, PowerMeter, PowerReading, SampleSource};

use crate::error::{HwError, Result};

const SPI_CLOCK_HZ: u32 = 1_350_000;

pub struct Mcp3008 {
    spi: Spi,
}

impl Mcp3008 {
    pub fn new(bus: u8, cs: u8) -> Result<Self> {
        let bus = match bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            other => return Err(HwError::Spi(format!("unsupported spi bus {other}"))),
        };
        let ss = match cs {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => return Err(HwError::Spi(format!("unsupported chip select {other}"))),
        };
        let spi = Spi::new(bus, ss, SPI_CLOCK_HZ, Mode::Mode0)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self { spi })
    }

    /// Single-ended conversion on `ch` (0..=7).
    pub fn read(&mut self, ch: u8) -> Result<u16> {
        if ch > 7 {
            return Err(HwError::AdcChannel(ch));
        }
        let tx = [0x01, (0x08 | ch) << 4, 0x00];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok((u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]))
    }
}

/// Channel map and scale factors for the sensor front end.
#[derive(Debug, Clone, Copy)]
pub struct AdcLayout {
    pub voltage_channel: u8,
    pub current_channel: u8,
    pub volts_per_count: f32,
    pub amps_per_count: f32,
}

impl AdcLayout {
    fn channel(&self, ch: Channel) -> u8 {
        match ch {
            Channel::Voltage => self.voltage_channel,
            Channel::Current => self.current_channel,
        }
    }
}

pub type SharedAdc = Arc<Mutex<Mcp3008>>;

fn read_shared(adc: &SharedAdc, ch: u8) -> Result<u16> {
    let mut guard = adc
        .lock()
        .map_err(|_| HwError::Spi("adc mutex poisoned".into()))?;
    guard.read(ch)
}

pub struct AdcSampler {
    adc: SharedAdc,
    layout: AdcLayout,
}

impl AdcSampler {
    pub fn new(adc: SharedAdc, layout: AdcLayout) -> Self {
        Self { adc, layout }
    }
}

impl SampleSource for AdcSampler {
    fn sample_instant(&mut self, channel: Channel) -> HwResult<i32> {
        let raw = read_shared(&self.adc, self.layout.channel(channel))?;
        Ok(i32::from(raw))
    }
}

/// RMS meter computing the AC component of both channels over a window.
pub struct AdcPowerMeter {
    adc: SharedAdc,
    layout: AdcLayout,
}

impl AdcPowerMeter {
    pub fn new(adc: SharedAdc, layout: AdcLayout) -> Self {
        Self { adc, layout }
    }
}

#[derive(Default)]
struct Moments {
    n: u32,
    sum: f64,
    sum_sq: f64,
}

impl Moments {
    fn push(&mut self, x: u16) {
        let x = f64::from(x);
        self.n += 1;
        self.sum += x;
        self.sum_sq += x * x;
    }

    /// Standard deviation around the window mean, i.e. AC RMS in counts.
    fn ac_rms(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let n = f64::from(self.n);
        let mean = self.sum / n;
        (self.sum_sq / n - mean * mean).max(0.0).sqrt()
    }
}

impl PowerMeter for AdcPowerMeter {
    fn measure(&mut self, window: Duration) -> HwResult<PowerReading> {
        let deadline = Instant::now() + window;
        let mut v = Moments::default();
        let mut i = Moments::default();
        loop {
            v.push(read_shared(&self.adc, self.layout.voltage_channel)?);
            i.push(read_shared(&self.adc, self.layout.current_channel)?);
            if Instant::now() >= deadline {
                break;
            }
        }
        if v.n < 2 {
            return Err(Box::new(HwError::Timeout));
        }
        let reading = PowerReading::new(
            (v.ac_rms() as f32) * self.layout.volts_per_count,
            (i.ac_rms() as f32) * self.layout.amps_per_count,
        );
        trace!(samples = v.n, vrms = reading.voltage_rms, irms = reading.current_rms, "adc rms");
        Ok(reading)
    }
}
