//! Deterministic test doubles for the hardware seams.
//!
//! All doubles read time from an injected `Clock`. Paired with a shared
//! `TestClock`, a meter's `measure` and the sequencer's sleeps advance the same
//! timeline the sampler reads, so whole weld sessions run instantly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use welder_traits::{Channel, Clock, HwResult, PowerMeter, PowerReading, SampleSource, Switch};

type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Voltage channel alternating between `high` and `low` every half period,
/// starting high. The current channel reads the midpoint.
pub struct SquareWave {
    clock: SharedClock,
    origin: Instant,
    period: Duration,
    high: i32,
    low: i32,
}

impl SquareWave {
    pub fn new(clock: SharedClock, period: Duration, high: i32, low: i32) -> Self {
        let origin = clock.now();
        Self {
            clock,
            origin,
            period: period.max(Duration::from_micros(2)),
            high,
            low,
        }
    }

    fn midpoint(&self) -> i32 {
        ((i64::from(self.high) + i64::from(self.low)) / 2) as i32
    }
}

impl SampleSource for SquareWave {
    fn sample_instant(&mut self, channel: Channel) -> HwResult<i32> {
        if channel == Channel::Current {
            return Ok(self.midpoint());
        }
        let t = self.clock.elapsed_since(self.origin).as_nanos();
        let period = self.period.as_nanos();
        Ok(if t % period < period / 2 {
            self.high
        } else {
            self.low
        })
    }
}

/// Piecewise-constant voltage signal: each `(at, value)` step holds until the next.
pub struct StepSignal {
    clock: SharedClock,
    origin: Instant,
    initial: i32,
    steps: Vec<(Duration, i32)>,
}

impl StepSignal {
    pub fn new(clock: SharedClock, initial: i32, mut steps: Vec<(Duration, i32)>) -> Self {
        steps.sort_by_key(|(at, _)| *at);
        let origin = clock.now();
        Self {
            clock,
            origin,
            initial,
            steps,
        }
    }

    /// A signal that never changes, as seen with mains absent.
    pub fn flat(clock: SharedClock, value: i32) -> Self {
        Self::new(clock, value, Vec::new())
    }
}

impl SampleSource for StepSignal {
    fn sample_instant(&mut self, _channel: Channel) -> HwResult<i32> {
        let t = self.clock.elapsed_since(self.origin);
        Ok(self
            .steps
            .iter()
            .rev()
            .find(|(at, _)| *at <= t)
            .map_or(self.initial, |(_, v)| *v))
    }
}

/// A sample source that always errors.
pub struct FailingSampler;

impl SampleSource for FailingSampler {
    fn sample_instant(&mut self, _channel: Channel) -> HwResult<i32> {
        Err(Box::new(std::io::Error::other("adc unplugged")))
    }
}

/// Meter that returns `on` while the shared switch flag is set and `off`
/// otherwise. Every `measure` sleeps the window on the clock.
pub struct SwitchAwareMeter {
    clock: SharedClock,
    switch_on: Arc<AtomicBool>,
    on: PowerReading,
    off: Arc<Mutex<PowerReading>>,
    calls: u32,
}

impl SwitchAwareMeter {
    pub fn new(clock: SharedClock, switch_on: Arc<AtomicBool>, on: PowerReading) -> Self {
        Self {
            clock,
            switch_on,
            on,
            off: Arc::new(Mutex::new(PowerReading::new(on.voltage_rms, 0.0))),
            calls: 0,
        }
    }

    /// A meter reporting the same reading regardless of switch state.
    pub fn constant(clock: SharedClock, reading: PowerReading) -> Self {
        Self::new(clock, Arc::new(AtomicBool::new(true)), reading)
    }

    /// Handle for changing the idle reading, e.g. electrode contact current.
    pub fn idle_handle(&self) -> Arc<Mutex<PowerReading>> {
        Arc::clone(&self.off)
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }
}

impl PowerMeter for SwitchAwareMeter {
    fn measure(&mut self, window: Duration) -> HwResult<PowerReading> {
        if window.is_zero() {
            return Err(Box::new(std::io::Error::other("zero measurement window")));
        }
        // Sample the switch state at the start of the window.
        let on = self.switch_on.load(Ordering::Acquire);
        self.clock.sleep(window);
        self.calls += 1;
        if on {
            Ok(self.on)
        } else {
            Ok(self.off.lock().map(|g| *g).unwrap_or_default())
        }
    }
}

/// One recorded transition of a `RecordingSwitch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchEvent {
    pub on: bool,
    /// Offset from the switch's creation on its clock.
    pub at: Duration,
}

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct SwitchLog {
    events: Vec<SwitchEvent>,
    /// `switch_on` calls made while already on.
    overlapping_on: u32,
}

/// Switch double that records every transition with its timestamp.
///
/// Clones share the same log and state.
#[derive(Clone)]
pub struct RecordingSwitch {
    clock: SharedClock,
    origin: Instant,
    on: Arc<AtomicBool>,
    log: Arc<Mutex<SwitchLog>>,
    on_hook: Option<Hook>,
    fail_on: bool,
}

impl RecordingSwitch {
    pub fn new(clock: SharedClock) -> Self {
        let origin = clock.now();
        Self {
            clock,
            origin,
            on: Arc::new(AtomicBool::new(false)),
            log: Arc::new(Mutex::new(SwitchLog::default())),
            on_hook: None,
            fail_on: false,
        }
    }

    /// Run `hook` after every successful `switch_on`, while the output is live.
    pub fn with_on_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_hook = Some(Arc::new(hook));
        self
    }

    /// Make `switch_on` fail, to exercise the hardware fault path.
    pub fn failing_on(mut self) -> Self {
        self.fail_on = true;
        self
    }

    pub fn on_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.on)
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Acquire)
    }

    pub fn events(&self) -> Vec<SwitchEvent> {
        self.log.lock().map(|g| g.events.clone()).unwrap_or_default()
    }

    pub fn overlapping_on_count(&self) -> u32 {
        self.log.lock().map(|g| g.overlapping_on).unwrap_or(0)
    }

    /// Completed on-intervals, in order.
    pub fn on_intervals(&self) -> Vec<Duration> {
        let mut out = Vec::new();
        let mut since: Option<Duration> = None;
        for ev in self.events() {
            match (ev.on, since) {
                (true, None) => since = Some(ev.at),
                (false, Some(start)) => {
                    out.push(ev.at.saturating_sub(start));
                    since = None;
                }
                _ => {}
            }
        }
        out
    }

    fn record(&self, on: bool) {
        let at = self.clock.elapsed_since(self.origin);
        let was_on = self.on.swap(on, Ordering::AcqRel);
        if let Ok(mut log) = self.log.lock() {
            if on && was_on {
                log.overlapping_on += 1;
            }
            // Only transitions are logged; a redundant off is not an event.
            if on != was_on {
                log.events.push(SwitchEvent { on, at });
            }
        }
    }
}

impl Switch for RecordingSwitch {
    fn switch_on(&mut self) -> HwResult<()> {
        if self.fail_on {
            return Err(Box::new(std::io::Error::other("ssr driver fault")));
        }
        self.record(true);
        if let Some(hook) = &self.on_hook {
            hook();
        }
        Ok(())
    }

    fn switch_off(&mut self) -> HwResult<()> {
        self.record(false);
        Ok(())
    }
}
