//! Operator-facing weld and auto-spot settings.

use serde::{Deserialize, Serialize};

/// Firing mode. Closed set; every dispatch over it is an exhaustive `match`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeldMode {
    #[default]
    Single,
    Double,
    Triple,
    /// Energy-targeted: the pulse ends when the learned target is delivered.
    Smart,
}

impl WeldMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WeldMode::Single => "single",
            WeldMode::Double => "double",
            WeldMode::Triple => "triple",
            WeldMode::Smart => "smart",
        }
    }
}

impl core::fmt::Display for WeldMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeldSettings {
    pub mode: WeldMode,
    pub pre_pulse_ms: u32,
    pub gap_ms: u32,
    pub main_pulse_ms: u32,
    /// Seed for the Smart-mode learning controller.
    pub target_energy_ws: f32,
}

impl Default for WeldSettings {
    fn default() -> Self {
        Self {
            mode: WeldMode::Single,
            pre_pulse_ms: 20,
            gap_ms: 40,
            main_pulse_ms: 80,
            target_energy_ws: 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoSpotSettings {
    pub enabled: bool,
    pub trigger_current_a: f32,
    /// Minimum mains RMS voltage for an automatic trigger; 0 disables.
    pub voltage_cutoff_v: f32,
    /// Maximum contact current for an automatic trigger; 0 disables.
    pub current_limit_a: f32,
}

impl Default for AutoSpotSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            trigger_current_a: 0.8,
            voltage_cutoff_v: 0.0,
            current_limit_a: 0.0,
        }
    }
}
