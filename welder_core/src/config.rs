//! Configuration types for the firing engine.
//!
//! These are the runtime configuration structs used by the core components.
//! They are separate from the TOML-deserialized config in `welder_config`.

use std::time::Duration;

/// Zero-cross detection.
#[derive(Debug, Clone)]
pub struct PhaseCfg {
    /// Timeout applied to each half of the wait independently.
    pub timeout_ms: u64,
    /// Delay between samples while polling; 0 spins.
    pub poll_us: u64,
}

impl Default for PhaseCfg {
    fn default() -> Self {
        Self {
            timeout_ms: 200,
            poll_us: 50,
        }
    }
}

impl PhaseCfg {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_micros(self.poll_us)
    }
}

/// How the integrator turns RMS windows into delivered energy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntegrationMethod {
    /// `delivered = latest window power × total elapsed`.
    ///
    /// This is an approximation: it assumes the most recent window's power
    /// held for the whole pulse.
    #[default]
    Windowed,
    /// `delivered = Σ power × window duration`.
    Riemann,
}

/// Energy integration and the hard on-time ceiling.
#[derive(Debug, Clone)]
pub struct EnergyCfg {
    /// No single pulse stays on longer than this.
    pub max_duration_ms: u64,
    pub window_ms: u64,
    pub method: IntegrationMethod,
}

impl Default for EnergyCfg {
    fn default() -> Self {
        Self {
            max_duration_ms: 1000,
            window_ms: 100,
            method: IntegrationMethod::Windowed,
        }
    }
}

impl EnergyCfg {
    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.max(1))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SequencerCfg {
    /// Wait for a fresh zero-cross before the third pulse of a triple.
    pub resync_third_pulse: bool,
}

/// Hill-climb parameters for the learning controller.
#[derive(Debug, Clone)]
pub struct LearningCfg {
    pub initial_ws: f32,
    pub step_ws: f32,
    pub max_ws: f32,
}

impl Default for LearningCfg {
    fn default() -> Self {
        Self {
            initial_ws: 150.0,
            step_ws: 10.0,
            max_ws: 5000.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TriggerCfg {
    /// Minimum spacing between accepted physical-switch requests.
    pub debounce_ms: u64,
}

impl Default for TriggerCfg {
    fn default() -> Self {
        Self { debounce_ms: 50 }
    }
}

/// Boot-time midpoint calibration.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    pub samples: u32,
    pub spacing_us: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            samples: 1000,
            spacing_us: 100,
        }
    }
}

/// Cooperative control-loop cadence.
#[derive(Debug, Clone)]
pub struct LoopCfg {
    pub tick_ms: u64,
    /// 0 disables periodic telemetry.
    pub telemetry_ms: u64,
    pub autospot_window_ms: u64,
}

impl Default for LoopCfg {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            telemetry_ms: 1000,
            autospot_window_ms: 40,
        }
    }
}

/// Everything a `WeldSessionController` is built from, besides hardware.
#[derive(Debug, Clone, Default)]
pub struct EngineCfg {
    pub phase: PhaseCfg,
    pub energy: EnergyCfg,
    pub sequencer: SequencerCfg,
    pub learning: LearningCfg,
    pub trigger: TriggerCfg,
    pub calibration: CalibrationCfg,
    pub weld: crate::settings::WeldSettings,
    pub autospot: crate::settings::AutoSpotSettings,
}
