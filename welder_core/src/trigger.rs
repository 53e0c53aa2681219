//! Trigger arbitration between the physical switch, remote `spot` commands
//! and the automatic current-based trigger.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use thiserror::Error;
use welder_traits::PowerReading;

use crate::config::TriggerCfg;
use crate::settings::AutoSpotSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Switch,
    Remote,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerRequest {
    pub source: TriggerSource,
    /// Milliseconds since the controller's epoch.
    pub at_ms: u64,
}

impl TriggerRequest {
    pub fn new(source: TriggerSource, at_ms: u64) -> Self {
        Self { source, at_ms }
    }
}

/// Why a trigger was refused. Rejections are expected events, not faults.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("a weld session is already in progress")]
    Busy,
    #[error("manual triggers are disabled while auto-spot is enabled")]
    AutoSpotActive,
    #[error("auto-spot is disabled")]
    AutoSpotDisabled,
    #[error("switch bounce inside the debounce window")]
    Debounced,
}

#[derive(Debug)]
pub struct TriggerArbiter {
    debounce_ms: u64,
    last_switch_ms: Option<u64>,
    /// Cleared after an accepted auto trigger; set again once contact current
    /// drops below the trigger threshold.
    auto_armed: bool,
}

impl TriggerArbiter {
    pub fn new(cfg: &TriggerCfg) -> Self {
        Self {
            debounce_ms: cfg.debounce_ms,
            last_switch_ms: None,
            auto_armed: true,
        }
    }

    /// Decide whether `req` may start a session.
    ///
    /// Accepted switch requests restart the debounce window; accepted auto
    /// requests disarm the auto-spot check.
    pub fn request_weld(
        &mut self,
        req: TriggerRequest,
        busy: bool,
        autospot: &AutoSpotSettings,
    ) -> Result<(), Rejection> {
        if busy {
            return Err(Rejection::Busy);
        }
        match req.source {
            TriggerSource::Switch | TriggerSource::Remote if autospot.enabled => {
                return Err(Rejection::AutoSpotActive);
            }
            TriggerSource::Auto if !autospot.enabled => {
                return Err(Rejection::AutoSpotDisabled);
            }
            _ => {}
        }
        match req.source {
            TriggerSource::Switch => {
                if let Some(last) = self.last_switch_ms
                    && req.at_ms.saturating_sub(last) < self.debounce_ms
                {
                    return Err(Rejection::Debounced);
                }
                self.last_switch_ms = Some(req.at_ms);
            }
            TriggerSource::Auto => self.auto_armed = false,
            TriggerSource::Remote => {}
        }
        Ok(())
    }

    pub fn accepts(
        &mut self,
        req: TriggerRequest,
        busy: bool,
        autospot: &AutoSpotSettings,
    ) -> bool {
        self.request_weld(req, busy, autospot).is_ok()
    }

    /// Whether an automatic weld should be requested for this reading.
    ///
    /// Due when auto-spot is enabled and armed, contact current is at or
    /// above the trigger threshold, mains voltage is at or above the cutoff
    /// and current is at or below the limit. A zero cutoff or limit disables
    /// that check.
    pub fn auto_trigger_due(&mut self, autospot: &AutoSpotSettings, reading: PowerReading) -> bool {
        let (v, i) = (reading.voltage_rms, reading.current_rms);
        if !autospot.enabled || !v.is_finite() || !i.is_finite() {
            return false;
        }
        if i < autospot.trigger_current_a {
            if !self.auto_armed {
                tracing::debug!(irms = i, "auto-spot re-armed");
            }
            self.auto_armed = true;
            return false;
        }
        if !self.auto_armed {
            return false;
        }
        if autospot.voltage_cutoff_v > 0.0 && v < autospot.voltage_cutoff_v {
            tracing::debug!(vrms = v, "auto-spot held off: mains below cutoff");
            return false;
        }
        if autospot.current_limit_a > 0.0 && i > autospot.current_limit_a {
            tracing::debug!(irms = i, "auto-spot held off: current above limit");
            return false;
        }
        true
    }

    pub fn auto_armed(&self) -> bool {
        self.auto_armed
    }
}

/// Single-producer/single-consumer hand-off from the switch interrupt.
///
/// The interrupt side only calls `signal`; the control loop drains with
/// `take` once per tick. Edges between two ticks coalesce into one, carrying
/// the latest timestamp.
#[derive(Debug, Default)]
pub struct SwitchEdge {
    pending: AtomicBool,
    stamp_ms: AtomicU64,
}

impl SwitchEdge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an edge. Safe to call from an interrupt or callback thread.
    pub fn signal(&self, stamp_ms: u64) {
        self.stamp_ms.store(stamp_ms, Ordering::Relaxed);
        // Release publishes the stamp before the flag.
        self.pending.store(true, Ordering::Release);
    }

    /// Take the pending edge, if any.
    pub fn take(&self) -> Option<u64> {
        if self.pending.swap(false, Ordering::Acquire) {
            Some(self.stamp_ms.load(Ordering::Relaxed))
        } else {
            None
        }
    }
}
