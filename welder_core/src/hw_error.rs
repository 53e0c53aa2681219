//! Maps `Box<dyn Error>` from trait boundaries to typed `WeldError`.
//!
//! The traits in `welder_traits` use `Box<dyn Error + Send + Sync>` so any
//! backend can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `welder_hardware::HwError`.

use crate::error::WeldError;

/// Map a trait-boundary error to a typed `WeldError`.
///
/// Known hardware error types are matched by downcast; anything else keeps
/// its message as a generic `Hardware` error.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> WeldError {
    #[cfg(feature = "hardware-errors")]
    {
        use welder_hardware::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => WeldError::Hardware("adc read timeout".into()),
                other => WeldError::HardwareFault(other.to_string()),
            };
        }
    }

    WeldError::Hardware(e.to_string())
}

/// Convert a boxed trait error straight into an `eyre::Report` carrying a `WeldError`.
pub(crate) fn to_report(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    eyre::Report::new(map_hw_error(&*e))
}
