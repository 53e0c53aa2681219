#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the spot-welder controller.
//!
//! `Config` and its sections are deserialized from TOML and validated.
//! Every section except `[pins]` has defaults, so a minimal file only
//! names the wiring.
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    /// BCM pin driving the SSR.
    pub ssr: u8,
    /// BCM pin of the trigger push-button (active low).
    pub trigger: u8,
    #[serde(default)]
    pub adc_spi_bus: u8,
    #[serde(default)]
    pub adc_cs: u8,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PhaseCfg {
    /// Timeout for each half of the zero-cross wait.
    pub timeout_ms: u64,
    /// Delay between voltage samples while polling; 0 spins.
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

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMethod {
    /// Latest window power times total elapsed time.
    #[default]
    Windowed,
    /// Sum of power times each window's duration.
    Riemann,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EnergyCfg {
    /// Hard ceiling on any single pulse's on-time.
    pub max_duration_ms: u64,
    /// RMS measurement window during energy integration.
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

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SequencerCfg {
    /// Wait for a fresh zero-cross before the third pulse of a triple.
    pub resync_third_pulse: bool,
}

/// Hill-climb step and cap. The climb starts from `weld.target_energy_ws`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LearningCfg {
    pub step_ws: f32,
    pub max_ws: f32,
}

impl Default for LearningCfg {
    fn default() -> Self {
        Self {
            step_ws: 10.0,
            max_ws: 5000.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TriggerCfg {
    pub debounce_ms: u64,
}

impl Default for TriggerCfg {
    fn default() -> Self {
        Self { debounce_ms: 50 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Raw samples averaged per channel at boot.
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlLoopCfg {
    pub tick_ms: u64,
    /// Interval between `{vrms, irms}` notifications; 0 disables them.
    pub telemetry_ms: u64,
    /// Measurement window used by the auto-spot check each tick.
    pub autospot_window_ms: u64,
}

impl Default for ControlLoopCfg {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            telemetry_ms: 1000,
            autospot_window_ms: 40,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WeldModeCfg {
    #[default]
    Single,
    Double,
    Triple,
    Smart,
}

/// Boot-time weld settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WeldCfg {
    pub mode: WeldModeCfg,
    pub pre_pulse_ms: u32,
    pub gap_ms: u32,
    pub main_pulse_ms: u32,
    pub target_energy_ws: f32,
}

impl Default for WeldCfg {
    fn default() -> Self {
        Self {
            mode: WeldModeCfg::Single,
            pre_pulse_ms: 20,
            gap_ms: 40,
            main_pulse_ms: 80,
            target_energy_ws: 150.0,
        }
    }
}

/// Boot-time auto-spot settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AutoSpotCfg {
    pub enabled: bool,
    pub trigger_current_a: f32,
    /// 0 disables the mains undervoltage check.
    pub voltage_cutoff_v: f32,
    /// 0 disables the short-circuit check.
    pub current_limit_a: f32,
}

impl Default for AutoSpotCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            trigger_current_a: 0.8,
            voltage_cutoff_v: 0.0,
            current_limit_a: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdcCfg {
    pub voltage_channel: u8,
    pub current_channel: u8,
    pub volts_per_count: f32,
    pub amps_per_count: f32,
}

impl Default for AdcCfg {
    fn default() -> Self {
        Self {
            voltage_channel: 0,
            current_channel: 1,
            volts_per_count: 0.78,
            amps_per_count: 0.05,
        }
    }
}

/// Parameters for the simulated rig used when the `hardware` feature is off.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    pub mains_vrms: f32,
    pub mains_hz: f32,
    pub load_current_a: f32,
    pub contact_current_a: f32,
    pub amplitude_counts: i32,
    pub midpoint_counts: i32,
    /// Flatten the voltage waveform to exercise the zero-cross fault path.
    pub mains_absent: bool,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            mains_vrms: 230.0,
            mains_hz: 50.0,
            load_current_a: 8.0,
            contact_current_a: 0.0,
            amplitude_counts: 1200,
            midpoint_counts: 2048,
            mains_absent: false,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub phase: PhaseCfg,
    #[serde(default)]
    pub energy: EnergyCfg,
    #[serde(default)]
    pub sequencer: SequencerCfg,
    #[serde(default)]
    pub learning: LearningCfg,
    #[serde(default)]
    pub trigger: TriggerCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub control_loop: ControlLoopCfg,
    #[serde(default)]
    pub weld: WeldCfg,
    #[serde(default)]
    pub autospot: AutoSpotCfg,
    #[serde(default)]
    pub adc: AdcCfg,
    #[serde(default)]
    pub sim: SimCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn finite_non_negative(x: f32) -> bool {
    x.is_finite() && x >= 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.pins.ssr == self.pins.trigger {
            eyre::bail!("pins.ssr and pins.trigger must differ");
        }

        // Phase
        if self.phase.timeout_ms == 0 {
            eyre::bail!("phase.timeout_ms must be >= 1");
        }
        if self.phase.poll_us >= self.phase.timeout_ms.saturating_mul(1000) {
            eyre::bail!("phase.poll_us must be shorter than phase.timeout_ms");
        }

        // Energy
        if self.energy.max_duration_ms == 0 {
            eyre::bail!("energy.max_duration_ms must be >= 1");
        }
        if self.energy.max_duration_ms > 10_000 {
            eyre::bail!("energy.max_duration_ms is unreasonably large (>10s)");
        }
        if self.energy.window_ms == 0 {
            eyre::bail!("energy.window_ms must be >= 1");
        }

        // Learning
        if !(self.learning.step_ws.is_finite() && self.learning.step_ws > 0.0) {
            eyre::bail!("learning.step_ws must be > 0");
        }
        if !(self.learning.max_ws.is_finite() && self.learning.max_ws > 0.0) {
            eyre::bail!("learning.max_ws must be > 0");
        }

        // Calibration
        if self.calibration.samples == 0 {
            eyre::bail!("calibration.samples must be >= 1");
        }

        // Control loop
        if self.control_loop.tick_ms == 0 {
            eyre::bail!("control_loop.tick_ms must be >= 1");
        }
        if self.control_loop.autospot_window_ms == 0 {
            eyre::bail!("control_loop.autospot_window_ms must be >= 1");
        }

        // Weld defaults
        let ceiling = self.energy.max_duration_ms;
        if u64::from(self.weld.pre_pulse_ms) > ceiling || u64::from(self.weld.main_pulse_ms) > ceiling
        {
            eyre::bail!("weld pulse durations must not exceed energy.max_duration_ms");
        }
        if !finite_non_negative(self.weld.target_energy_ws)
            || self.weld.target_energy_ws > self.learning.max_ws
        {
            eyre::bail!("weld.target_energy_ws must be in [0, learning.max_ws]");
        }

        // Auto-spot
        if !(self.autospot.trigger_current_a.is_finite() && self.autospot.trigger_current_a > 0.0) {
            eyre::bail!("autospot.trigger_current_a must be > 0");
        }
        if !finite_non_negative(self.autospot.voltage_cutoff_v) {
            eyre::bail!("autospot.voltage_cutoff_v must be >= 0");
        }
        if !finite_non_negative(self.autospot.current_limit_a) {
            eyre::bail!("autospot.current_limit_a must be >= 0");
        }
        if self.autospot.current_limit_a > 0.0
            && self.autospot.current_limit_a < self.autospot.trigger_current_a
        {
            eyre::bail!("autospot.current_limit_a must be >= trigger_current_a when set");
        }

        // ADC
        if self.adc.voltage_channel > 7 || self.adc.current_channel > 7 {
            eyre::bail!("adc channels must be in 0..=7");
        }
        if self.adc.voltage_channel == self.adc.current_channel {
            eyre::bail!("adc.voltage_channel and adc.current_channel must differ");
        }

        // Sim
        if !(self.sim.mains_hz.is_finite() && self.sim.mains_hz > 0.0) {
            eyre::bail!("sim.mains_hz must be > 0");
        }
        if self.sim.amplitude_counts <= 0 {
            eyre::bail!("sim.amplitude_counts must be > 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
