//! Rig assembly: the simulated installation by default, the Raspberry Pi
//! backends with `--features hardware`.

use std::sync::Arc;

use welder_config::Config;
use welder_core::{EngineCfg, Notifier, Welder, WelderLoop};
use welder_hardware::{SimParams, SimulatedMains};
use welder_traits::{Clock, MonotonicClock};

/// Which backend the welder is wired to.
pub enum Backend {
    Simulated(SimulatedMains),
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    Hardware,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Simulated(_) => "sim",
            #[cfg(all(feature = "hardware", target_os = "linux"))]
            Backend::Hardware => "hardware",
        }
    }
}

#[cfg_attr(all(feature = "hardware", target_os = "linux"), allow(dead_code))]
fn sim_params(cfg: &welder_config::SimCfg) -> SimParams {
    SimParams {
        mains_vrms: cfg.mains_vrms,
        mains_hz: cfg.mains_hz,
        load_current_a: cfg.load_current_a,
        contact_current_a: cfg.contact_current_a,
        amplitude_counts: cfg.amplitude_counts,
        midpoint_counts: cfg.midpoint_counts,
    }
}

/// Build a welder around the configured backend. Calibrates on the way.
pub fn assemble(
    cfg: &Config,
    engine: EngineCfg,
    notifier: impl Notifier + Send + 'static,
) -> eyre::Result<(Welder, Backend)> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let builder = Welder::builder()
        .with_config(engine)
        .with_clock(Arc::clone(&clock))
        .with_notifier(notifier);

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        use std::sync::Mutex;
        use welder_hardware::gpio::GpioSwitch;
        use welder_hardware::mcp3008::{AdcLayout, AdcPowerMeter, AdcSampler, Mcp3008};

        let adc = Arc::new(Mutex::new(Mcp3008::new(cfg.pins.adc_spi_bus, cfg.pins.adc_cs)?));
        let layout = AdcLayout {
            voltage_channel: cfg.adc.voltage_channel,
            current_channel: cfg.adc.current_channel,
            volts_per_count: cfg.adc.volts_per_count,
            amps_per_count: cfg.adc.amps_per_count,
        };
        let welder = builder
            .with_switch(GpioSwitch::new(cfg.pins.ssr)?)
            .with_sampler(AdcSampler::new(Arc::clone(&adc), layout))
            .with_meter(AdcPowerMeter::new(adc, layout))
            .build()?;
        tracing::info!(ssr = cfg.pins.ssr, "hardware rig ready");
        Ok((welder, Backend::Hardware))
    }

    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        let mains = SimulatedMains::new(sim_params(&cfg.sim), clock);
        mains.set_mains_present(!cfg.sim.mains_absent);
        let welder = builder
            .with_switch(mains.switch())
            .with_sampler(mains.sampler())
            .with_meter(mains.meter())
            .build()?;
        tracing::info!(mains_absent = cfg.sim.mains_absent, "simulated rig ready");
        Ok((welder, Backend::Simulated(mains)))
    }
}

/// Keeps the trigger interrupt registered while alive.
#[cfg_attr(not(all(feature = "hardware", target_os = "linux")), allow(dead_code))]
pub struct TriggerGuard {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    _input: welder_hardware::gpio::TriggerInput,
}

/// Route the push-button interrupt into the loop's switch edge.
#[cfg_attr(not(all(feature = "hardware", target_os = "linux")), allow(unused_variables))]
pub fn attach_trigger(
    cfg: &Config,
    lp: &WelderLoop,
    backend: &Backend,
) -> eyre::Result<Option<TriggerGuard>> {
    match backend {
        Backend::Simulated(_) => {
            tracing::debug!(
                pin = cfg.pins.trigger,
                "no trigger input in simulation; send a spot command instead"
            );
            Ok(None)
        }
        #[cfg(all(feature = "hardware", target_os = "linux"))]
        Backend::Hardware => {
            let edge = lp.switch_edge();
            let clock = lp.welder().clock();
            let epoch = lp.welder().epoch();
            let input = welder_hardware::gpio::TriggerInput::attach(cfg.pins.trigger, move || {
                edge.signal(clock.ms_since(epoch));
            })?;
            Ok(Some(TriggerGuard { _input: input }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_params_follow_config() {
        let cfg = welder_config::SimCfg {
            mains_hz: 60.0,
            load_current_a: 12.5,
            ..welder_config::SimCfg::default()
        };
        let p = sim_params(&cfg);
        assert_eq!(p.mains_hz, 60.0);
        assert_eq!(p.load_current_a, 12.5);
        assert_eq!(p.midpoint_counts, 2048);
    }
}
