//! Simulated mains, SSR and RMS meter sharing one timeline.
//!
//! The three handles returned by [`SimulatedMains`] observe the same state:
//! the sampler renders a sine wave from the injected clock, the meter reports
//! load current only while the simulated switch is closed.
use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use welder_traits::{Channel, Clock, HwResult, PowerMeter, PowerReading, SampleSource, Switch};

use crate::error::HwError;

/// Electrical parameters of the simulated installation.
#[derive(Debug, Clone)]
pub struct SimParams {
    pub mains_vrms: f32,
    pub mains_hz: f32,
    /// Current drawn through the welding transformer while the SSR is on.
    pub load_current_a: f32,
    /// Sense current seen with the SSR off (electrodes touching the work).
    pub contact_current_a: f32,
    /// Peak deviation of the voltage channel from the midpoint, in counts.
    pub amplitude_counts: i32,
    /// ADC code corresponding to 0 V on the voltage channel.
    pub midpoint_counts: i32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            mains_vrms: 230.0,
            mains_hz: 50.0,
            load_current_a: 8.0,
            contact_current_a: 0.0,
            amplitude_counts: 1200,
            midpoint_counts: 2048,
        }
    }
}

struct SimState {
    params: SimParams,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    switch_on: AtomicBool,
    mains_present: AtomicBool,
    contact_current_bits: AtomicU32,
    on_count: AtomicU32,
    overlapping_on: AtomicU32,
}

impl SimState {
    fn phase(&self) -> f32 {
        let t = self.clock.elapsed_since(self.epoch).as_secs_f32();
        (TAU * self.params.mains_hz * t).sin()
    }

    fn contact_current(&self) -> f32 {
        f32::from_bits(self.contact_current_bits.load(Ordering::Relaxed))
    }
}

/// Shared simulated installation. Cheap to clone.
#[derive(Clone)]
pub struct SimulatedMains {
    state: Arc<SimState>,
}

impl SimulatedMains {
    pub fn new(params: SimParams, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        let contact = params.contact_current_a.to_bits();
        Self {
            state: Arc::new(SimState {
                params,
                clock,
                epoch,
                switch_on: AtomicBool::new(false),
                mains_present: AtomicBool::new(true),
                contact_current_bits: AtomicU32::new(contact),
                on_count: AtomicU32::new(0),
                overlapping_on: AtomicU32::new(0),
            }),
        }
    }

    pub fn switch(&self) -> SimulatedSwitch {
        SimulatedSwitch {
            state: self.state.clone(),
        }
    }

    pub fn sampler(&self) -> SimulatedSampler {
        SimulatedSampler {
            state: self.state.clone(),
        }
    }

    pub fn meter(&self) -> SimulatedMeter {
        SimulatedMeter {
            state: self.state.clone(),
        }
    }

    /// Emulate electrodes touching (or leaving) the workpiece.
    pub fn set_contact_current(&self, amps: f32) {
        self.state
            .contact_current_bits
            .store(amps.to_bits(), Ordering::Relaxed);
    }

    /// Unplugging the voltage sensor flattens the sampled waveform.
    pub fn set_mains_present(&self, present: bool) {
        self.state.mains_present.store(present, Ordering::Relaxed);
    }

    pub fn is_switch_on(&self) -> bool {
        self.state.switch_on.load(Ordering::Acquire)
    }

    /// Number of off→on transitions seen so far.
    pub fn switch_on_count(&self) -> u32 {
        self.state.on_count.load(Ordering::Relaxed)
    }

    /// Number of times switch_on was called while already on.
    pub fn overlapping_on_count(&self) -> u32 {
        self.state.overlapping_on.load(Ordering::Relaxed)
    }
}

pub struct SimulatedSwitch {
    state: Arc<SimState>,
}

impl Switch for SimulatedSwitch {
    fn switch_on(&mut self) -> HwResult<()> {
        if self.state.switch_on.swap(true, Ordering::AcqRel) {
            self.state.overlapping_on.fetch_add(1, Ordering::Relaxed);
        } else {
            self.state.on_count.fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!("ssr on (simulated)");
        Ok(())
    }

    fn switch_off(&mut self) -> HwResult<()> {
        self.state.switch_on.store(false, Ordering::Release);
        tracing::trace!("ssr off (simulated)");
        Ok(())
    }
}

pub struct SimulatedSampler {
    state: Arc<SimState>,
}

impl SampleSource for SimulatedSampler {
    fn sample_instant(&mut self, channel: Channel) -> HwResult<i32> {
        let p = &self.state.params;
        let mid = p.midpoint_counts;
        match channel {
            Channel::Voltage => {
                if !self.state.mains_present.load(Ordering::Relaxed) {
                    return Ok(mid);
                }
                let dev = p.amplitude_counts as f32 * self.state.phase();
                Ok(mid + dev.round() as i32)
            }
            Channel::Current => {
                let amps = if self.state.switch_on.load(Ordering::Acquire) {
                    p.load_current_a
                } else {
                    self.state.contact_current()
                };
                let full_scale = p.load_current_a.max(1.0);
                let dev = p.amplitude_counts as f32 * (amps / full_scale) * self.state.phase();
                Ok(mid + dev.round() as i32)
            }
        }
    }
}

pub struct SimulatedMeter {
    state: Arc<SimState>,
}

impl PowerMeter for SimulatedMeter {
    fn measure(&mut self, window: Duration) -> HwResult<PowerReading> {
        if window.is_zero() {
            return Err(Box::new(HwError::Simulated("zero measurement window")));
        }
        self.state.clock.sleep(window);
        let p = &self.state.params;
        let vrms = if self.state.mains_present.load(Ordering::Relaxed) {
            p.mains_vrms
        } else {
            0.0
        };
        let irms = if self.state.switch_on.load(Ordering::Acquire) {
            p.load_current_a
        } else {
            self.state.contact_current()
        };
        Ok(PowerReading::new(vrms, irms))
    }
}
