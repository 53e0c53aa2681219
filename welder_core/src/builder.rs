//! Type-state builder for the boxed `Welder`.
//!
//! `build()` is only available once a switch, sample source and power meter
//! have been provided. `try_build()` is always available and reports the
//! missing piece at runtime.

use std::marker::PhantomData;
use std::sync::Arc;

use welder_traits::{Clock, MonotonicClock, PowerMeter, SampleSource, Switch};

use crate::calibration::CalibrationState;
use crate::config::{
    CalibrationCfg, EnergyCfg, EngineCfg, LearningCfg, PhaseCfg, SequencerCfg, TriggerCfg,
};
use crate::error::{BuildError, Result};
use crate::protocol::Notifier;
use crate::rig::WeldRig;
use crate::session::WeldSessionController;
use crate::settings::{AutoSpotSettings, WeldSettings};

pub type BoxedSwitch = Box<dyn Switch + Send>;
pub type BoxedSampler = Box<dyn SampleSource + Send>;
pub type BoxedMeter = Box<dyn PowerMeter + Send>;

/// Controller over boxed hardware, as assembled by the CLI.
pub type Welder = WeldSessionController<BoxedSwitch, BoxedSampler, BoxedMeter>;

impl Welder {
    pub fn builder() -> WelderBuilder<Missing, Missing, Missing> {
        WelderBuilder::default()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct WelderBuilder<S, V, M> {
    switch: Option<BoxedSwitch>,
    sampler: Option<BoxedSampler>,
    meter: Option<BoxedMeter>,
    cfg: EngineCfg,
    calibration: Option<CalibrationState>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    notifier: Option<Box<dyn Notifier + Send>>,
    _s: PhantomData<S>,
    _v: PhantomData<V>,
    _m: PhantomData<M>,
}

impl Default for WelderBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            switch: None,
            sampler: None,
            meter: None,
            cfg: EngineCfg::default(),
            calibration: None,
            clock: None,
            notifier: None,
            _s: PhantomData,
            _v: PhantomData,
            _m: PhantomData,
        }
    }
}

impl<S, V, M> WelderBuilder<S, V, M> {
    fn retag<S2, V2, M2>(self) -> WelderBuilder<S2, V2, M2> {
        WelderBuilder {
            switch: self.switch,
            sampler: self.sampler,
            meter: self.meter,
            cfg: self.cfg,
            calibration: self.calibration,
            clock: self.clock,
            notifier: self.notifier,
            _s: PhantomData,
            _v: PhantomData,
            _m: PhantomData,
        }
    }

    pub fn with_switch(mut self, switch: impl Switch + Send + 'static) -> WelderBuilder<Set, V, M> {
        self.switch = Some(Box::new(switch));
        self.retag()
    }

    pub fn with_sampler(
        mut self,
        sampler: impl SampleSource + Send + 'static,
    ) -> WelderBuilder<S, Set, M> {
        self.sampler = Some(Box::new(sampler));
        self.retag()
    }

    pub fn with_meter(mut self, meter: impl PowerMeter + Send + 'static) -> WelderBuilder<S, V, Set> {
        self.meter = Some(Box::new(meter));
        self.retag()
    }

    /// Replace every engine setting at once.
    pub fn with_config(mut self, cfg: EngineCfg) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn with_phase(mut self, phase: PhaseCfg) -> Self {
        self.cfg.phase = phase;
        self
    }

    pub fn with_energy(mut self, energy: EnergyCfg) -> Self {
        self.cfg.energy = energy;
        self
    }

    pub fn with_sequencer(mut self, sequencer: SequencerCfg) -> Self {
        self.cfg.sequencer = sequencer;
        self
    }

    pub fn with_learning(mut self, learning: LearningCfg) -> Self {
        self.cfg.learning = learning;
        self
    }

    pub fn with_trigger(mut self, trigger: TriggerCfg) -> Self {
        self.cfg.trigger = trigger;
        self
    }

    pub fn with_calibration_cfg(mut self, calibration: CalibrationCfg) -> Self {
        self.cfg.calibration = calibration;
        self
    }

    pub fn with_settings(mut self, settings: WeldSettings) -> Self {
        self.cfg.weld = settings;
        self
    }

    pub fn with_autospot(mut self, autospot: AutoSpotSettings) -> Self {
        self.cfg.autospot = autospot;
        self
    }

    /// Skip boot-time calibration and use these midpoints.
    pub fn with_calibration(mut self, calibration: CalibrationState) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + Send + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn try_build(self) -> Result<Welder> {
        let switch = self
            .switch
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSwitch))?;
        let sampler = self
            .sampler
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSampler))?;
        let meter = self
            .meter
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMeter))?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let mut welder = WeldSessionController::new(
            WeldRig::new(switch, sampler, meter),
            self.cfg,
            self.calibration,
            clock,
        )?;
        if let Some(n) = self.notifier {
            welder.set_notifier(n);
        }
        Ok(welder)
    }
}

impl WelderBuilder<Set, Set, Set> {
    pub fn build(self) -> Result<Welder> {
        self.try_build()
    }
}
