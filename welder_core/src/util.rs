//! Common time helpers for welder_core.

use std::time::Duration;

/// Clamp a millisecond duration to `ceiling`.
#[inline]
pub fn clamp_ms(ms: u32, ceiling: Duration) -> Duration {
    Duration::from_millis(u64::from(ms)).min(ceiling)
}

/// Energy in watt-seconds for `power_w` held over `d`.
#[inline]
pub fn watt_seconds(power_w: f32, d: Duration) -> f32 {
    power_w * d.as_secs_f32()
}

/// Saturating conversion of a duration to whole milliseconds.
#[inline]
pub fn as_millis_u64(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_respects_ceiling() {
        let ceiling = Duration::from_millis(1000);
        assert_eq!(clamp_ms(80, ceiling), Duration::from_millis(80));
        assert_eq!(clamp_ms(5000, ceiling), ceiling);
    }

    #[test]
    fn watt_seconds_scales_by_time() {
        assert!((watt_seconds(200.0, Duration::from_millis(500)) - 100.0).abs() < 1e-3);
    }
}
