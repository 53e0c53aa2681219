//! Cooperative control loop.
//!
//! The loop thread is the only writer of weld state. Remote frames arrive over
//! a bounded channel, switch edges through a `SwitchEdge`, and everything is
//! serviced in a fixed order once per tick. A weld blocks the tick; anything
//! that arrives meanwhile waits in the channel for the next one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use welder_traits::{Clock, PowerMeter, PowerReading, SampleSource, Switch};

use crate::builder::{BoxedMeter, BoxedSampler, BoxedSwitch};
use crate::config::LoopCfg;
use crate::error::Result;
use crate::protocol::{Command, Notification, Notifier};
use crate::session::{CommandOutcome, WeldReport, WeldSessionController};
use crate::trigger::{SwitchEdge, TriggerRequest, TriggerSource};

/// Queue depth for raw inbound frames.
pub const COMMAND_QUEUE_DEPTH: usize = 64;

/// Bounded channel for raw inbound command frames.
pub fn command_channel() -> (Sender<String>, Receiver<String>) {
    bounded(COMMAND_QUEUE_DEPTH)
}

/// Control loop over boxed hardware.
pub type WelderLoop = ControlLoop<BoxedSwitch, BoxedSampler, BoxedMeter>;

pub struct ControlLoop<W, V, P> {
    welder: WeldSessionController<W, V, P>,
    commands: Receiver<String>,
    edge: Arc<SwitchEdge>,
    telemetry: Box<dyn Notifier + Send>,
    cfg: LoopCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    last_telemetry: Option<Instant>,
    disconnected: bool,
}

impl<W, V, P> ControlLoop<W, V, P>
where
    W: Switch,
    V: SampleSource,
    P: PowerMeter,
{
    /// `telemetry` receives the periodic `{vrms, irms}` notifications; session
    /// notifications go to the controller's own notifier.
    pub fn new(
        welder: WeldSessionController<W, V, P>,
        commands: Receiver<String>,
        telemetry: Box<dyn Notifier + Send>,
        cfg: LoopCfg,
    ) -> Self {
        let clock = welder.clock();
        Self {
            welder,
            commands,
            edge: Arc::new(SwitchEdge::new()),
            telemetry,
            cfg,
            clock,
            last_telemetry: None,
            disconnected: false,
        }
    }

    /// Handle for the switch interrupt.
    pub fn switch_edge(&self) -> Arc<SwitchEdge> {
        Arc::clone(&self.edge)
    }

    pub fn welder(&self) -> &WeldSessionController<W, V, P> {
        &self.welder
    }

    pub fn welder_mut(&mut self) -> &mut WeldSessionController<W, V, P> {
        &mut self.welder
    }

    pub fn into_welder(self) -> WeldSessionController<W, V, P> {
        self.welder
    }

    /// True once every command sender has been dropped and the queue is drained.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// One pass of the loop. Returns the welds that ran during it.
    pub fn tick(&mut self) -> Vec<WeldReport> {
        let mut fired = Vec::new();

        if let Some(at_ms) = self.edge.take() {
            let req = TriggerRequest::new(TriggerSource::Switch, at_ms);
            if let Ok(report) = self.welder.request_weld(req) {
                fired.push(report);
            }
        }

        self.drain_commands(&mut fired);

        let mut reading = None;
        if self.welder.autospot().enabled {
            reading = self.measure(self.cfg.autospot_window_ms);
            if let Some(r) = reading
                && let Some(Ok(report)) = self.welder.check_autospot(r)
            {
                fired.push(report);
            }
        }

        self.maybe_emit_telemetry(reading);

        self.clock.sleep(Duration::from_millis(self.cfg.tick_ms));
        fired
    }

    /// Tick until `shutdown` is set or the command channel disconnects, then
    /// force the switch off.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        tracing::info!(tick_ms = self.cfg.tick_ms, "control loop started");
        while !shutdown.load(Ordering::Acquire) && !self.disconnected {
            self.tick();
        }
        self.welder.force_off();
        tracing::info!(
            disconnected = self.disconnected,
            "control loop stopped; switch off"
        );
        Ok(())
    }

    fn drain_commands(&mut self, fired: &mut Vec<WeldReport>) {
        loop {
            let frame = match self.commands.try_recv() {
                Ok(frame) => frame,
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    return;
                }
            };
            let cmd = match Command::parse(&frame) {
                Ok(cmd) => cmd,
                Err(e) => {
                    tracing::debug!(error = %e, "dropping malformed frame");
                    continue;
                }
            };
            match self.welder.handle_command(cmd) {
                CommandOutcome::Weld(Ok(report)) => fired.push(report),
                CommandOutcome::Recalibrated(Err(e)) => {
                    tracing::warn!(error = %e, "recalibration failed");
                }
                _ => {}
            }
        }
    }

    fn measure(&mut self, window_ms: u64) -> Option<PowerReading> {
        match self.welder.measure(Duration::from_millis(window_ms.max(1))) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::warn!(error = %e, "measurement failed");
                None
            }
        }
    }

    fn maybe_emit_telemetry(&mut self, reading: Option<PowerReading>) {
        if self.cfg.telemetry_ms == 0 {
            return;
        }
        let now = self.clock.now();
        let due = self.last_telemetry.is_none_or(|last| {
            now.saturating_duration_since(last) >= Duration::from_millis(self.cfg.telemetry_ms)
        });
        if !due {
            return;
        }
        self.last_telemetry = Some(now);
        let reading = match reading {
            Some(r) => Some(r),
            None => self.measure(self.cfg.autospot_window_ms),
        };
        if let Some(r) = reading {
            self.telemetry.notify(Notification::Telemetry {
                vrms: r.voltage_rms,
                irms: r.current_rms,
            });
        }
    }
}
