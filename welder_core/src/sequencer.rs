//! Pulse sequencing for the four weld modes.

use std::sync::Arc;
use std::time::Duration;

use welder_traits::{Clock, PowerMeter, SampleSource, Switch};

use crate::config::{EnergyCfg, PhaseCfg, SequencerCfg};
use crate::energy::{EnergyIntegrator, EnergyReport};
use crate::error::Result;
use crate::gate::{SessionGuard, SessionState};
use crate::hw_error::to_report;
use crate::phase::PhaseSynchronizer;
use crate::rig::WeldRig;
use crate::settings::{WeldMode, WeldSettings};
use crate::util::clamp_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Synchronizing,
    /// Pulse number, 1-based.
    Pulsing(u8),
    /// Gap after pulse number k.
    Gap(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseRecord {
    pub index: u8,
    pub on_time: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceReport {
    pub mode: WeldMode,
    pub pulses: Vec<PulseRecord>,
    /// Present for Smart mode only.
    pub energy: Option<EnergyReport>,
}

/// A sequence that stopped on an error. `pulses` holds the pulses that
/// completed before it; the switch is already off.
#[derive(Debug)]
pub struct SequenceAbort {
    pub pulses: Vec<PulseRecord>,
    pub error: eyre::Report,
}

impl SequenceReport {
    pub fn total_on_time(&self) -> Duration {
        self.pulses.iter().map(|p| p.on_time).sum()
    }
}

pub struct PulseSequencer {
    phase: PhaseSynchronizer,
    integrator: EnergyIntegrator,
    cfg: SequencerCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    state: SequencerState,
}

impl PulseSequencer {
    pub fn new(
        phase: PhaseCfg,
        energy: EnergyCfg,
        cfg: SequencerCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            phase: PhaseSynchronizer::new(phase, Arc::clone(&clock)),
            integrator: EnergyIntegrator::new(energy, Arc::clone(&clock)),
            cfg,
            clock,
            state: SequencerState::Idle,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn ceiling(&self) -> Duration {
        self.integrator.cfg().ceiling()
    }

    /// Run one full pulse group for `settings`.
    ///
    /// Any failure forces the switch off before the error is returned,
    /// together with the pulses already delivered. The sequencer is back in
    /// `Idle` on every exit path.
    pub fn fire<W, V, P>(
        &mut self,
        rig: &mut WeldRig<W, V, P>,
        settings: &WeldSettings,
        target_ws: f32,
        midpoint: i32,
        guard: &SessionGuard,
    ) -> core::result::Result<SequenceReport, SequenceAbort>
    where
        W: Switch,
        V: SampleSource,
        P: PowerMeter,
    {
        let mut pulses = Vec::with_capacity(3);
        let result = self.run(rig, settings, target_ws, midpoint, guard, &mut pulses);
        let state = self.state;
        self.state = SequencerState::Idle;
        match result {
            Ok(energy) => Ok(SequenceReport {
                mode: settings.mode,
                pulses,
                energy,
            }),
            Err(error) => {
                rig.force_off();
                tracing::warn!(
                    ?state,
                    completed = pulses.len(),
                    error = %error,
                    "sequence aborted; switch forced off"
                );
                Err(SequenceAbort { pulses, error })
            }
        }
    }

    fn run<W, V, P>(
        &mut self,
        rig: &mut WeldRig<W, V, P>,
        settings: &WeldSettings,
        target_ws: f32,
        midpoint: i32,
        guard: &SessionGuard,
        pulses: &mut Vec<PulseRecord>,
    ) -> Result<Option<EnergyReport>>
    where
        W: Switch,
        V: SampleSource,
        P: PowerMeter,
    {
        self.sync(rig, midpoint)?;
        guard.advance(SessionState::Firing);

        match settings.mode {
            WeldMode::Single => {
                self.timed_pulse(rig, 1, settings.main_pulse_ms, pulses)?;
            }
            WeldMode::Double => {
                self.timed_pulse(rig, 1, settings.pre_pulse_ms, pulses)?;
                self.gap(1, settings.gap_ms);
                self.sync(rig, midpoint)?;
                self.timed_pulse(rig, 2, settings.main_pulse_ms, pulses)?;
            }
            WeldMode::Triple => {
                self.timed_pulse(rig, 1, settings.pre_pulse_ms, pulses)?;
                self.gap(1, settings.gap_ms);
                self.sync(rig, midpoint)?;
                self.timed_pulse(rig, 2, settings.main_pulse_ms, pulses)?;
                self.gap(2, settings.gap_ms);
                if self.cfg.resync_third_pulse {
                    self.sync(rig, midpoint)?;
                }
                self.timed_pulse(rig, 3, settings.main_pulse_ms, pulses)?;
            }
            WeldMode::Smart => {
                return self.energy_pulse(rig, target_ws, pulses).map(Some);
            }
        }
        Ok(None)
    }

    fn sync<W, V: SampleSource, P>(&mut self, rig: &mut WeldRig<W, V, P>, midpoint: i32) -> Result<()> {
        self.state = SequencerState::Synchronizing;
        self.phase
            .wait_for_rising_zero_cross(&mut rig.sampler, midpoint)
            .map(|_| ())
    }

    fn gap(&mut self, after: u8, gap_ms: u32) {
        self.state = SequencerState::Gap(after);
        self.clock.sleep(Duration::from_millis(u64::from(gap_ms)));
    }

    fn timed_pulse<W: Switch, V, P>(
        &mut self,
        rig: &mut WeldRig<W, V, P>,
        index: u8,
        ms: u32,
        pulses: &mut Vec<PulseRecord>,
    ) -> Result<()> {
        let ceiling = self.ceiling();
        let on_for = clamp_ms(ms, ceiling);
        if on_for < Duration::from_millis(u64::from(ms)) {
            tracing::warn!(
                pulse = index,
                requested_ms = ms,
                ceiling_ms = ceiling.as_millis() as u64,
                "pulse clamped to energy ceiling"
            );
        }
        if on_for.is_zero() {
            tracing::debug!(pulse = index, "zero-length pulse skipped");
            return Ok(());
        }
        self.state = SequencerState::Pulsing(index);
        let start = self.clock.now();
        rig.switch.switch_on().map_err(to_report)?;
        self.clock.sleep(on_for);
        rig.switch.switch_off().map_err(to_report)?;
        let on_time = self.clock.elapsed_since(start);
        tracing::debug!(pulse = index, on_us = on_time.as_micros() as u64, "pulse");
        pulses.push(PulseRecord { index, on_time });
        Ok(())
    }

    fn energy_pulse<W: Switch, V, P: PowerMeter>(
        &mut self,
        rig: &mut WeldRig<W, V, P>,
        target_ws: f32,
        pulses: &mut Vec<PulseRecord>,
    ) -> Result<EnergyReport> {
        if target_ws.is_nan() || target_ws <= 0.0 {
            tracing::debug!(target_ws, "no energy to deliver; pulse skipped");
            return Ok(EnergyReport::nothing_to_deliver());
        }
        self.state = SequencerState::Pulsing(1);
        let start = self.clock.now();
        rig.switch.switch_on().map_err(to_report)?;
        let report = self.integrator.integrate_until(&mut rig.meter, target_ws)?;
        rig.switch.switch_off().map_err(to_report)?;
        let on_time = self.clock.elapsed_since(start);
        pulses.push(PulseRecord { index: 1, on_time });
        Ok(report)
    }
}
