use std::time::Duration;

use welder_traits::{Channel, Clock, SampleSource};

use crate::config::CalibrationCfg;
use crate::error::{Result, WeldError};
use crate::hw_error::to_report;

/// Zero-level offsets of the analog front end, taken with no weld in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationState {
    /// Raw voltage sample that corresponds to 0 V.
    pub zero_cross_midpoint: i32,
    /// Raw current sample that corresponds to 0 A.
    pub current_offset: i32,
}

impl Default for CalibrationState {
    /// Mid-scale of a 12-bit converter.
    fn default() -> Self {
        Self {
            zero_cross_midpoint: 2048,
            current_offset: 2048,
        }
    }
}

/// Average `cfg.samples` raw readings of each channel, `cfg.spacing_us` apart.
///
/// The spacing times the sample count should cover a whole number of mains
/// cycles so the AC component averages out.
pub fn calibrate<S: SampleSource + ?Sized>(
    source: &mut S,
    cfg: &CalibrationCfg,
    clock: &dyn Clock,
) -> Result<CalibrationState> {
    if cfg.samples == 0 {
        return Err(eyre::Report::new(WeldError::Config(
            "calibration.samples must be >= 1".into(),
        )));
    }
    let spacing = Duration::from_micros(cfg.spacing_us);
    let mut v_sum: i64 = 0;
    let mut i_sum: i64 = 0;
    for _ in 0..cfg.samples {
        v_sum += i64::from(source.sample_instant(Channel::Voltage).map_err(to_report)?);
        i_sum += i64::from(source.sample_instant(Channel::Current).map_err(to_report)?);
        clock.sleep(spacing);
    }
    let n = i64::from(cfg.samples);
    let state = CalibrationState {
        zero_cross_midpoint: div_round_nearest(v_sum, n),
        current_offset: div_round_nearest(i_sum, n),
    };
    tracing::info!(
        midpoint = state.zero_cross_midpoint,
        current_offset = state.current_offset,
        samples = cfg.samples,
        "calibrated analog midpoints"
    );
    Ok(state)
}

/// Rounded integer mean; ties away from zero. The mean of i32 samples fits in i32.
fn div_round_nearest(sum: i64, n: i64) -> i32 {
    let half = n / 2;
    let q = if sum >= 0 {
        (sum + half) / n
    } else {
        (sum - half) / n
    };
    q.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
