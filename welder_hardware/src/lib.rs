//! Hardware backends for the welder.
//!
//! The simulated rig is always available; the Raspberry Pi backends (GPIO SSR
//! output, trigger interrupt, MCP3008 ADC) are gated behind `hardware`.
pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod mcp3008;

pub use error::HwError;
pub use sim::{SimParams, SimulatedMains, SimulatedMeter, SimulatedSampler, SimulatedSwitch};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use welder_traits::clock::TestClock;
    use welder_traits::{Channel, Clock, PowerMeter, SampleSource, Switch};

    fn rig() -> (TestClock, SimulatedMains) {
        let clock = TestClock::new();
        let mains = SimulatedMains::new(SimParams::default(), Arc::new(clock.clone()));
        (clock, mains)
    }

    #[test]
    fn voltage_channel_follows_mains_phase() {
        let (clock, mains) = rig();
        let mut sampler = mains.sampler();
        // 50 Hz: quarter period = 5 ms peak, three quarters = trough
        clock.sleep(Duration::from_millis(5));
        let peak = sampler.sample_instant(Channel::Voltage).unwrap();
        clock.sleep(Duration::from_millis(10));
        let trough = sampler.sample_instant(Channel::Voltage).unwrap();
        assert!(peak > 2048 + 1100, "peak {peak}");
        assert!(trough < 2048 - 1100, "trough {trough}");
    }

    #[test]
    fn flat_voltage_when_mains_absent() {
        let (clock, mains) = rig();
        mains.set_mains_present(false);
        let mut sampler = mains.sampler();
        clock.sleep(Duration::from_millis(5));
        assert_eq!(sampler.sample_instant(Channel::Voltage).unwrap(), 2048);
    }

    #[test]
    fn meter_sees_load_only_while_switched_on() {
        let (clock, mains) = rig();
        let mut switch = mains.switch();
        let mut meter = mains.meter();
        let idle = meter.measure(Duration::from_millis(100)).unwrap();
        assert_eq!(idle.current_rms, 0.0);
        switch.switch_on().unwrap();
        let loaded = meter.measure(Duration::from_millis(100)).unwrap();
        switch.switch_off().unwrap();
        assert_eq!(loaded.current_rms, 8.0);
        assert_eq!(clock.offset(), Duration::from_millis(200));
        assert_eq!(mains.switch_on_count(), 1);
        assert_eq!(mains.overlapping_on_count(), 0);
    }

    #[test]
    fn contact_current_is_visible_with_switch_off() {
        let (_clock, mains) = rig();
        mains.set_contact_current(1.2);
        let mut meter = mains.meter();
        let r = meter.measure(Duration::from_millis(10)).unwrap();
        assert!((r.current_rms - 1.2).abs() < f32::EPSILON);
    }
}
