#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, unbounded};
use welder_core::config::EngineCfg;
use welder_core::mocks::{RecordingSwitch, SquareWave, SwitchAwareMeter};
use welder_core::{CalibrationState, Notification, Welder};
use welder_traits::clock::TestClock;
use welder_traits::{Clock, PowerReading, SampleSource};

pub const MID: i32 = 2048;
pub const HIGH: i32 = MID + 1000;
pub const LOW: i32 = MID - 1000;

/// 230 V mains with an 8 A weld current: 1840 W while the switch is on.
pub const LOADED: PowerReading = PowerReading {
    voltage_rms: 230.0,
    current_rms: 8.0,
};

pub fn shared(clock: &TestClock) -> Arc<dyn Clock + Send + Sync> {
    Arc::new(clock.clone())
}

/// 50 Hz square wave: high for 10 ms, then low, rising edges every 20 ms.
pub fn mains(clock: &TestClock) -> SquareWave {
    SquareWave::new(shared(clock), Duration::from_millis(20), HIGH, LOW)
}

pub struct Handles {
    pub clock: TestClock,
    pub switch: RecordingSwitch,
    /// Meter reading while the switch is off (electrode contact current).
    pub idle: Arc<Mutex<PowerReading>>,
    pub notes: Receiver<Notification>,
}

impl Handles {
    pub fn drain(&self) -> Vec<Notification> {
        self.notes.try_iter().collect()
    }

    pub fn set_contact_current(&self, amps: f32) {
        if let Ok(mut r) = self.idle.lock() {
            r.current_rms = amps;
        }
    }
}

pub struct RigSetup {
    pub cfg: EngineCfg,
    pub loaded: PowerReading,
    pub switch: Option<RecordingSwitch>,
}

impl Default for RigSetup {
    fn default() -> Self {
        Self {
            cfg: EngineCfg::default(),
            loaded: LOADED,
            switch: None,
        }
    }
}

/// Build a boxed welder over mock hardware sharing one `TestClock`.
pub fn welder_with(
    clock: TestClock,
    sampler: impl SampleSource + Send + 'static,
    setup: RigSetup,
) -> (Welder, Handles) {
    let switch = setup
        .switch
        .unwrap_or_else(|| RecordingSwitch::new(shared(&clock)));
    let meter = SwitchAwareMeter::new(shared(&clock), switch.on_flag(), setup.loaded);
    let idle = meter.idle_handle();
    let (tx, rx) = unbounded();
    let welder = Welder::builder()
        .with_switch(switch.clone())
        .with_sampler(sampler)
        .with_meter(meter)
        .with_clock(shared(&clock))
        .with_config(setup.cfg)
        .with_calibration(CalibrationState {
            zero_cross_midpoint: MID,
            current_offset: MID,
        })
        .with_notifier(tx)
        .build()
        .expect("valid welder");
    (
        welder,
        Handles {
            clock,
            switch,
            idle,
            notes: rx,
        },
    )
}

pub fn welder(cfg: EngineCfg) -> (Welder, Handles) {
    let clock = TestClock::new();
    let sampler = mains(&clock);
    welder_with(
        clock,
        sampler,
        RigSetup {
            cfg,
            ..RigSetup::default()
        },
    )
}

pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}
