//! Weld session controller: the owner of all process-wide weld state.
//!
//! Settings, auto-spot settings, learned energy, calibration and the hardware
//! rig live here and change only through the narrow methods below. A weld runs
//! start to finish inside `request_weld`; the session gate makes that the
//! single linearization point for "one weld at a time".

use std::sync::Arc;
use std::time::{Duration, Instant};

use welder_traits::{Clock, PowerMeter, PowerReading, SampleSource, Switch};

use crate::calibration::{CalibrationState, calibrate};
use crate::config::{CalibrationCfg, EngineCfg};
use crate::energy::EnergyReport;
use crate::error::{BuildError, Result, WeldError};
use crate::gate::{SessionGate, SessionMonitor, SessionState};
use crate::hw_error::to_report;
use crate::learning::{AdaptiveLearningController, EnergyFeedbackState};
use crate::protocol::{Command, Discard, Notification, Notifier, WeldStatus};
use crate::rig::WeldRig;
use crate::sequencer::{PulseRecord, PulseSequencer};
use crate::settings::{AutoSpotSettings, WeldMode, WeldSettings};
use crate::trigger::{Rejection, TriggerArbiter, TriggerRequest, TriggerSource};
use crate::util::as_millis_u64;

/// Outcome of one accepted weld.
#[derive(Debug, Clone, PartialEq)]
pub struct WeldReport {
    pub source: TriggerSource,
    pub mode: WeldMode,
    /// Terminal status sent to the observer.
    pub status: WeldStatus,
    pub pulses: Vec<PulseRecord>,
    /// Smart mode only. Duration modes have no closed-loop measurement.
    pub energy: Option<EnergyReport>,
    /// Post-weld measurement, when the meter answered.
    pub final_reading: Option<PowerReading>,
    pub fault: Option<WeldError>,
}

impl WeldReport {
    pub fn is_ok(&self) -> bool {
        self.fault.is_none()
    }
}

/// What a remote command did.
#[derive(Debug)]
pub enum CommandOutcome {
    SettingsQueued,
    AutoSpotUpdated,
    Weld(core::result::Result<WeldReport, Rejection>),
    Feedback(EnergyFeedbackState),
    Recalibrated(Result<CalibrationState>),
}

pub struct WeldSessionController<W, V, P> {
    rig: WeldRig<W, V, P>,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    active: WeldSettings,
    pending: Option<WeldSettings>,
    autospot: AutoSpotSettings,
    learning: AdaptiveLearningController,
    arbiter: TriggerArbiter,
    sequencer: PulseSequencer,
    calibration: CalibrationState,
    calibration_cfg: CalibrationCfg,
    gate: SessionGate,
    report_window: Duration,
    notifier: Box<dyn Notifier + Send>,
}

impl<W, V, P> core::fmt::Debug for WeldSessionController<W, V, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WeldSessionController")
            .field("settings", &self.active)
            .field("pending", &self.pending)
            .field("autospot", &self.autospot)
            .field("learning", &self.learning.state())
            .field("calibration", &self.calibration)
            .field("state", &self.gate.state())
            .finish()
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(cfg: &EngineCfg) -> Result<()> {
    if cfg.phase.timeout_ms == 0 {
        return Err(invalid("phase timeout must be >= 1 ms"));
    }
    if cfg.energy.max_duration_ms == 0 {
        return Err(invalid("energy ceiling must be >= 1 ms"));
    }
    if cfg.energy.window_ms == 0 {
        return Err(invalid("energy window must be >= 1 ms"));
    }
    if !(cfg.learning.max_ws.is_finite() && cfg.learning.max_ws > 0.0) {
        return Err(invalid("learning max_ws must be > 0"));
    }
    if !(cfg.learning.step_ws.is_finite() && cfg.learning.step_ws > 0.0) {
        return Err(invalid("learning step_ws must be > 0"));
    }
    if cfg.calibration.samples == 0 {
        return Err(invalid("calibration samples must be >= 1"));
    }
    Ok(())
}

impl<W, V, P> WeldSessionController<W, V, P>
where
    W: Switch,
    V: SampleSource,
    P: PowerMeter,
{
    /// Build a controller around `rig`.
    ///
    /// Without a `calibration`, the analog midpoints are measured now; the
    /// switch must be off and no weld in progress.
    pub fn new(
        mut rig: WeldRig<W, V, P>,
        cfg: EngineCfg,
        calibration: Option<CalibrationState>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self> {
        validate(&cfg)?;
        rig.switch.switch_off().map_err(to_report)?;
        let calibration = match calibration {
            Some(c) => c,
            None => calibrate(&mut rig.sampler, &cfg.calibration, &*clock)?,
        };
        let learning = AdaptiveLearningController::new(cfg.learning.clone());
        let report_window = cfg.energy.window();
        Ok(Self {
            sequencer: PulseSequencer::new(
                cfg.phase,
                cfg.energy,
                cfg.sequencer,
                Arc::clone(&clock),
            ),
            arbiter: TriggerArbiter::new(&cfg.trigger),
            epoch: clock.now(),
            clock,
            rig,
            active: cfg.weld,
            pending: None,
            autospot: cfg.autospot,
            learning,
            calibration,
            calibration_cfg: cfg.calibration,
            gate: SessionGate::new(),
            report_window,
            notifier: Box::new(Discard),
        })
    }

    pub fn set_notifier(&mut self, notifier: Box<dyn Notifier + Send>) {
        self.notifier = notifier;
    }

    /// Milliseconds since this controller was built, on its clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    pub fn clock(&self) -> Arc<dyn Clock + Send + Sync> {
        Arc::clone(&self.clock)
    }

    pub fn monitor(&self) -> SessionMonitor {
        self.gate.monitor()
    }

    pub fn session_state(&self) -> SessionState {
        self.gate.state()
    }

    pub fn settings(&self) -> &WeldSettings {
        &self.active
    }

    pub fn pending_settings(&self) -> Option<&WeldSettings> {
        self.pending.as_ref()
    }

    pub fn autospot(&self) -> &AutoSpotSettings {
        &self.autospot
    }

    pub fn feedback_state(&self) -> EnergyFeedbackState {
        self.learning.state()
    }

    pub fn calibration(&self) -> CalibrationState {
        self.calibration
    }

    pub fn rig(&self) -> &WeldRig<W, V, P> {
        &self.rig
    }

    // ── Mutators ────────────────────────────────────────────────────────────

    /// Queue settings for the next session. The active session, if any, keeps
    /// its snapshot.
    pub fn update_weld_settings(&mut self, settings: WeldSettings) {
        tracing::debug!(mode = %settings.mode, "weld settings queued");
        self.pending = Some(settings);
    }

    /// Promote pending settings to active. Returns whether anything was
    /// applied. The learned energy state is left alone; only feedback moves it.
    pub fn apply_pending_settings(&mut self) -> bool {
        let Some(next) = self.pending.take() else {
            return false;
        };
        tracing::info!(
            mode = %next.mode,
            pre_ms = next.pre_pulse_ms,
            gap_ms = next.gap_ms,
            main_ms = next.main_pulse_ms,
            target_ws = next.target_energy_ws,
            "weld settings applied"
        );
        self.active = next;
        true
    }

    pub fn update_autospot(&mut self, autospot: AutoSpotSettings) {
        tracing::info!(
            enabled = autospot.enabled,
            trigger_a = autospot.trigger_current_a,
            "auto-spot settings updated"
        );
        self.autospot = autospot;
    }

    pub fn feedback_accept(&mut self) -> EnergyFeedbackState {
        self.learning.on_accept();
        self.notify_energy();
        self.learning.state()
    }

    pub fn feedback_reject(&mut self) -> EnergyFeedbackState {
        self.learning.on_reject();
        self.notify_energy();
        self.learning.state()
    }

    /// Re-measure the analog midpoints. Refused while a session is active.
    pub fn recalibrate(&mut self) -> Result<CalibrationState> {
        if self.gate.is_busy() {
            return Err(eyre::Report::new(WeldError::State(
                "cannot recalibrate during a weld".into(),
            )));
        }
        self.calibration = calibrate(&mut self.rig.sampler, &self.calibration_cfg, &*self.clock)?;
        Ok(self.calibration)
    }

    /// Take an RMS reading outside a session.
    pub fn measure(&mut self, window: Duration) -> Result<PowerReading> {
        self.rig.meter.measure(window).map_err(to_report)
    }

    /// Force the output off. Used on shutdown.
    pub fn force_off(&mut self) {
        self.rig.force_off();
    }

    /// Run the auto-spot check against `reading`, firing if it is due.
    pub fn check_autospot(
        &mut self,
        reading: PowerReading,
    ) -> Option<core::result::Result<WeldReport, Rejection>> {
        if !self.arbiter.auto_trigger_due(&self.autospot, reading) {
            return None;
        }
        let at_ms = self.now_ms();
        Some(self.request_weld(TriggerRequest::new(TriggerSource::Auto, at_ms)))
    }

    pub fn handle_command(&mut self, cmd: Command) -> CommandOutcome {
        match cmd {
            Command::UpdateWeldSettings {
                mode,
                pre,
                gap,
                main,
                target,
            } => {
                let base = self.pending.as_ref().unwrap_or(&self.active);
                let target_energy_ws = target.unwrap_or(base.target_energy_ws);
                self.update_weld_settings(WeldSettings {
                    mode,
                    pre_pulse_ms: pre,
                    gap_ms: gap,
                    main_pulse_ms: main,
                    target_energy_ws,
                });
                CommandOutcome::SettingsQueued
            }
            Command::UpdateAutospotSettings {
                enabled,
                trig_thresh,
                v_cutoff,
                i_limit,
            } => {
                self.update_autospot(AutoSpotSettings {
                    enabled,
                    trigger_current_a: trig_thresh,
                    voltage_cutoff_v: v_cutoff,
                    current_limit_a: i_limit.unwrap_or(0.0),
                });
                CommandOutcome::AutoSpotUpdated
            }
            Command::Spot => {
                let at_ms = self.now_ms();
                CommandOutcome::Weld(
                    self.request_weld(TriggerRequest::new(TriggerSource::Remote, at_ms)),
                )
            }
            Command::FeedbackOk => CommandOutcome::Feedback(self.feedback_accept()),
            Command::FeedbackWeak => CommandOutcome::Feedback(self.feedback_reject()),
            Command::Recalibrate => CommandOutcome::Recalibrated(self.recalibrate()),
        }
    }

    // ── Session ─────────────────────────────────────────────────────────────

    /// Arbitrate `req` and, if accepted, run one complete weld session.
    ///
    /// Sequence faults do not surface as `Err`; they end the session with an
    /// error status recorded in the report.
    pub fn request_weld(
        &mut self,
        req: TriggerRequest,
    ) -> core::result::Result<WeldReport, Rejection> {
        if let Err(r) = self
            .arbiter
            .request_weld(req, self.gate.is_busy(), &self.autospot)
        {
            tracing::debug!(source = ?req.source, at_ms = req.at_ms, reason = %r, "trigger rejected");
            return Err(r);
        }
        let Some(guard) = self.gate.try_begin() else {
            return Err(Rejection::Busy);
        };

        self.apply_pending_settings();
        let settings = self.active.clone();
        let target_ws = self.learning.target_ws();
        tracing::info!(
            source = ?req.source,
            mode = %settings.mode,
            target_ws,
            "weld session start"
        );
        self.notifier.notify(Notification::status(WeldStatus::Welding));

        let outcome = self.sequencer.fire(
            &mut self.rig,
            &settings,
            target_ws,
            self.calibration.zero_cross_midpoint,
            &guard,
        );

        guard.advance(SessionState::Reporting);
        let final_reading = match self.rig.meter.measure(self.report_window) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::warn!(error = %e, "final measurement failed");
                None
            }
        };

        let report = match outcome {
            Ok(seq) => {
                if let Some(energy) = &seq.energy {
                    self.notifier.notify(Notification::Pulse {
                        pulse: as_millis_u64(seq.total_on_time()),
                        energy: energy.delivered_ws,
                    });
                    self.notify_energy();
                }
                WeldReport {
                    source: req.source,
                    mode: settings.mode,
                    status: WeldStatus::Ready,
                    pulses: seq.pulses,
                    energy: seq.energy,
                    final_reading,
                    fault: None,
                }
            }
            Err(abort) => {
                let e = &abort.error;
                let fault = e
                    .downcast_ref::<WeldError>()
                    .cloned()
                    .unwrap_or_else(|| WeldError::Hardware(format!("{e:#}")));
                let status = match fault {
                    WeldError::ZeroCrossTimeout { .. } => WeldStatus::ZmptErr,
                    _ => WeldStatus::HwErr,
                };
                tracing::error!(
                    error = %fault,
                    status = status.as_str(),
                    fired = abort.pulses.len(),
                    "weld session aborted"
                );
                WeldReport {
                    source: req.source,
                    mode: settings.mode,
                    status,
                    pulses: abort.pulses,
                    energy: None,
                    final_reading,
                    fault: Some(fault),
                }
            }
        };

        self.notifier.notify(Notification::status(report.status));
        drop(guard);
        tracing::info!(
            status = report.status.as_str(),
            pulses = report.pulses.len(),
            "weld session end"
        );
        Ok(report)
    }

    fn notify_energy(&mut self) {
        let s = self.learning.state();
        self.notifier.notify(Notification::Energy {
            suggested_energy: s.suggested_ws,
            locked_energy: s.locked_ws,
        });
    }
}
