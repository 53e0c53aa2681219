//! Closed-loop energy integration during an active pulse.

use std::sync::Arc;
use std::time::Duration;

use welder_traits::{Clock, PowerMeter, PowerReading};

use crate::config::{EnergyCfg, IntegrationMethod};
use crate::error::Result;
use crate::hw_error::to_report;
use crate::util::watt_seconds;

/// Why integration stopped. Hitting the ceiling is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyTermination {
    TargetReached,
    /// The on-time ceiling elapsed before the target was delivered.
    CeilingReached,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnergyReport {
    pub delivered_ws: f32,
    pub elapsed: Duration,
    /// Number of measurement windows taken.
    pub samples: u32,
    pub termination: EnergyTermination,
    pub last_reading: Option<PowerReading>,
}

impl EnergyReport {
    /// Report for a pulse that never started because the target was already met.
    pub fn nothing_to_deliver() -> Self {
        Self {
            delivered_ws: 0.0,
            elapsed: Duration::ZERO,
            samples: 0,
            termination: EnergyTermination::TargetReached,
            last_reading: None,
        }
    }
}

pub struct EnergyIntegrator {
    cfg: EnergyCfg,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl EnergyIntegrator {
    pub fn new(cfg: EnergyCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { cfg, clock }
    }

    pub fn cfg(&self) -> &EnergyCfg {
        &self.cfg
    }

    /// Measure power in windows until `target_ws` is delivered or the ceiling elapses.
    ///
    /// The caller holds the switch on for the duration of this call. Windows
    /// shrink to the remaining ceiling so the last one never overruns it.
    pub fn integrate_until<M: PowerMeter + ?Sized>(
        &self,
        meter: &mut M,
        target_ws: f32,
    ) -> Result<EnergyReport> {
        let ceiling = self.cfg.ceiling();
        let start = self.clock.now();
        let mut delivered = 0.0_f32;
        let mut samples = 0_u32;
        let mut last_reading = None;

        let termination = loop {
            let elapsed = self.clock.elapsed_since(start);
            if elapsed >= ceiling {
                break EnergyTermination::CeilingReached;
            }
            if delivered >= target_ws {
                break EnergyTermination::TargetReached;
            }
            let window = self.cfg.window().min(ceiling - elapsed);
            let window_start = self.clock.now();
            let reading = meter.measure(window).map_err(to_report)?;
            samples += 1;
            let power = reading.power_w();
            delivered = match self.cfg.method {
                IntegrationMethod::Windowed => {
                    watt_seconds(power, self.clock.elapsed_since(start))
                }
                IntegrationMethod::Riemann => {
                    delivered + watt_seconds(power, self.clock.elapsed_since(window_start))
                }
            };
            last_reading = Some(reading);
            tracing::trace!(
                window = samples,
                power_w = power,
                delivered_ws = delivered,
                "energy window"
            );
        };

        let elapsed = self.clock.elapsed_since(start);
        if termination == EnergyTermination::CeilingReached {
            tracing::warn!(
                target_ws,
                delivered_ws = delivered,
                elapsed_ms = elapsed.as_millis() as u64,
                "energy ceiling reached before target"
            );
        }
        Ok(EnergyReport {
            delivered_ws: delivered,
            elapsed,
            samples,
            termination,
            last_reading,
        })
    }
}
