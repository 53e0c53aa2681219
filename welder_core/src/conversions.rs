//! `From` implementations bridging `welder_config` types to `welder_core` types.

use crate::config::{
    CalibrationCfg, EnergyCfg, EngineCfg, IntegrationMethod, LearningCfg, LoopCfg, PhaseCfg,
    SequencerCfg, TriggerCfg,
};
use crate::settings::{AutoSpotSettings, WeldMode, WeldSettings};

// ── PhaseCfg ─────────────────────────────────────────────────────────────────

impl From<&welder_config::PhaseCfg> for PhaseCfg {
    fn from(c: &welder_config::PhaseCfg) -> Self {
        Self {
            timeout_ms: c.timeout_ms,
            poll_us: c.poll_us,
        }
    }
}

// ── EnergyCfg ────────────────────────────────────────────────────────────────

impl From<welder_config::IntegrationMethod> for IntegrationMethod {
    fn from(m: welder_config::IntegrationMethod) -> Self {
        match m {
            welder_config::IntegrationMethod::Windowed => IntegrationMethod::Windowed,
            welder_config::IntegrationMethod::Riemann => IntegrationMethod::Riemann,
        }
    }
}

impl From<&welder_config::EnergyCfg> for EnergyCfg {
    fn from(c: &welder_config::EnergyCfg) -> Self {
        Self {
            max_duration_ms: c.max_duration_ms,
            window_ms: c.window_ms,
            method: c.method.into(),
        }
    }
}

impl From<&welder_config::SequencerCfg> for SequencerCfg {
    fn from(c: &welder_config::SequencerCfg) -> Self {
        Self {
            resync_third_pulse: c.resync_third_pulse,
        }
    }
}

impl From<&welder_config::Config> for LearningCfg {
    fn from(c: &welder_config::Config) -> Self {
        Self {
            initial_ws: c.weld.target_energy_ws,
            step_ws: c.learning.step_ws,
            max_ws: c.learning.max_ws,
        }
    }
}

impl From<&welder_config::TriggerCfg> for TriggerCfg {
    fn from(c: &welder_config::TriggerCfg) -> Self {
        Self {
            debounce_ms: c.debounce_ms,
        }
    }
}

impl From<&welder_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &welder_config::CalibrationCfg) -> Self {
        Self {
            samples: c.samples,
            spacing_us: c.spacing_us,
        }
    }
}

impl From<&welder_config::ControlLoopCfg> for LoopCfg {
    fn from(c: &welder_config::ControlLoopCfg) -> Self {
        Self {
            tick_ms: c.tick_ms,
            telemetry_ms: c.telemetry_ms,
            autospot_window_ms: c.autospot_window_ms,
        }
    }
}

// ── Settings ─────────────────────────────────────────────────────────────────

impl From<welder_config::WeldModeCfg> for WeldMode {
    fn from(m: welder_config::WeldModeCfg) -> Self {
        match m {
            welder_config::WeldModeCfg::Single => WeldMode::Single,
            welder_config::WeldModeCfg::Double => WeldMode::Double,
            welder_config::WeldModeCfg::Triple => WeldMode::Triple,
            welder_config::WeldModeCfg::Smart => WeldMode::Smart,
        }
    }
}

impl From<&welder_config::WeldCfg> for WeldSettings {
    fn from(c: &welder_config::WeldCfg) -> Self {
        Self {
            mode: c.mode.into(),
            pre_pulse_ms: c.pre_pulse_ms,
            gap_ms: c.gap_ms,
            main_pulse_ms: c.main_pulse_ms,
            target_energy_ws: c.target_energy_ws,
        }
    }
}

impl From<&welder_config::AutoSpotCfg> for AutoSpotSettings {
    fn from(c: &welder_config::AutoSpotCfg) -> Self {
        Self {
            enabled: c.enabled,
            trigger_current_a: c.trigger_current_a,
            voltage_cutoff_v: c.voltage_cutoff_v,
            current_limit_a: c.current_limit_a,
        }
    }
}

// ── Whole config ─────────────────────────────────────────────────────────────

impl From<&welder_config::Config> for EngineCfg {
    fn from(c: &welder_config::Config) -> Self {
        Self {
            phase: (&c.phase).into(),
            energy: (&c.energy).into(),
            sequencer: (&c.sequencer).into(),
            learning: c.into(),
            trigger: (&c.trigger).into(),
            calibration: (&c.calibration).into(),
            weld: (&c.weld).into(),
            autospot: (&c.autospot).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_sections_convert() {
        let cfg = welder_config::load_toml(
            "[pins]\nssr = 17\ntrigger = 27\n[weld]\nmode = \"smart\"\n[energy]\nmethod = \"riemann\"\n",
        )
        .unwrap();
        let weld = WeldSettings::from(&cfg.weld);
        assert_eq!(weld.mode, WeldMode::Smart);
        assert_eq!(weld.target_energy_ws, 150.0);
        let energy = EnergyCfg::from(&cfg.energy);
        assert_eq!(energy.method, IntegrationMethod::Riemann);
        assert_eq!(energy.max_duration_ms, 1000);
        let lp = LoopCfg::from(&cfg.control_loop);
        assert_eq!(lp.tick_ms, 10);
        let engine = EngineCfg::from(&cfg);
        assert_eq!(engine.phase.timeout_ms, 200);
        assert_eq!(engine.weld.mode, WeldMode::Smart);
        assert!(!engine.autospot.enabled);
    }
}
