//! Mains zero-cross detection.

use std::sync::Arc;
use std::time::Duration;

use welder_traits::{Channel, Clock, SampleSource};

use crate::config::PhaseCfg;
use crate::error::{CrossPhase, Result, WeldError};
use crate::hw_error::to_report;

/// Busy-polls the voltage channel until a rising zero-cross.
pub struct PhaseSynchronizer {
    cfg: PhaseCfg,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl PhaseSynchronizer {
    pub fn new(cfg: PhaseCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { cfg, clock }
    }

    pub fn cfg(&self) -> &PhaseCfg {
        &self.cfg
    }

    /// Block until the voltage sample drops below `midpoint` and then rises
    /// back above it. Each half has its own timeout.
    ///
    /// Returns the total time waited.
    pub fn wait_for_rising_zero_cross<S: SampleSource + ?Sized>(
        &self,
        source: &mut S,
        midpoint: i32,
    ) -> Result<Duration> {
        let start = self.clock.now();
        self.wait_phase(source, CrossPhase::Falling, |s| s < midpoint)?;
        self.wait_phase(source, CrossPhase::Rising, |s| s > midpoint)?;
        let waited = self.clock.elapsed_since(start);
        tracing::trace!(waited_us = waited.as_micros() as u64, "zero-cross");
        Ok(waited)
    }

    fn wait_phase<S: SampleSource + ?Sized>(
        &self,
        source: &mut S,
        phase: CrossPhase,
        reached: impl Fn(i32) -> bool,
    ) -> Result<()> {
        let timeout = self.cfg.timeout();
        let poll = self.cfg.poll();
        let phase_start = self.clock.now();
        loop {
            let sample = source.sample_instant(Channel::Voltage).map_err(to_report)?;
            if reached(sample) {
                return Ok(());
            }
            if self.clock.elapsed_since(phase_start) >= timeout {
                tracing::debug!(%phase, last_sample = sample, "zero-cross timeout");
                return Err(eyre::Report::new(WeldError::ZeroCrossTimeout { phase }));
            }
            if poll.is_zero() {
                std::hint::spin_loop();
            } else {
                self.clock.sleep(poll);
            }
        }
    }
}
