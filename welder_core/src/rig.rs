use welder_traits::{PowerMeter, SampleSource, Switch};

/// The three hardware seams a weld session drives.
pub struct WeldRig<W, V, P> {
    pub switch: W,
    pub sampler: V,
    pub meter: P,
}

impl<W: Switch, V: SampleSource, P: PowerMeter> WeldRig<W, V, P> {
    pub fn new(switch: W, sampler: V, meter: P) -> Self {
        Self {
            switch,
            sampler,
            meter,
        }
    }

    /// De-energize the output, logging rather than propagating a failure.
    pub fn force_off(&mut self) {
        if let Err(e) = self.switch.switch_off() {
            tracing::error!(error = %e, "failed to force switch off");
        }
    }
}
