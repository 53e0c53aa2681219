//! Human-readable error descriptions and structured JSON error formatting.

use welder_core::error::{BuildError, WeldError};
use welder_core::{Rejection, WeldStatus};
use welder_hardware::HwError;

/// Exit code for a weld aborted on a missing zero-cross.
pub const EXIT_ZMPT: i32 = 3;
/// Exit code for a switch, sampler or meter fault.
pub const EXIT_HW: i32 = 4;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSwitch | BuildError::MissingSampler | BuildError::MissingMeter => format!(
                "What happened: The weld engine was built without a {}.\nLikely causes: A backend failed to initialize or was not wired into the builder.\nHow to fix: Check the startup log for the failing device.",
                be.to_string().trim_start_matches("missing ")
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(we) = err.downcast_ref::<WeldError>() {
        return match we {
            WeldError::ZeroCrossTimeout { phase } => format!(
                "What happened: No mains zero-crossing was seen (gave up waiting for the {phase} half). The switch was not fired.\nLikely causes: Voltage sensor unplugged or unpowered, mains absent, or the midpoint drifted since calibration.\nHow to fix: Check the ZMPT sensor wiring and supply, then recalibrate. Raise phase.timeout_ms only if the mains frequency is unusually low."
            ),
            WeldError::Hardware(msg) | WeldError::HardwareFault(msg) => format!(
                "What happened: Hardware fault ({msg}). The switch was forced off.\nLikely causes: SSR driver, ADC or SPI wiring problem, or missing GPIO permissions.\nHow to fix: Verify [pins] and [adc] in the config and the wiring, then run `welder self-check`."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(r) = err.downcast_ref::<Rejection>() {
        return match r {
            Rejection::AutoSpotActive => "What happened: The weld request was refused because auto-spot is enabled.\nLikely causes: [autospot] enabled = true in the config.\nHow to fix: Disable auto-spot to fire manually.".to_string(),
            other => format!("What happened: The weld request was refused ({other}).\nHow to fix: Wait for the current weld to finish, then retry."),
        };
    }

    if let Some(hw) = err.downcast_ref::<HwError>() {
        return format!(
            "What happened: Failed to initialize hardware ({hw}).\nLikely causes: Incorrect pin numbers, SPI disabled, or insufficient GPIO/SPI permissions.\nHow to fix: Fix [pins] in the config, enable SPI, and ensure the process can access /dev/gpiomem and /dev/spidev*."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = format!("{err:#}").to_ascii_lowercase();

    if lower.contains("invalid configuration") || lower.contains("missing field") {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: Missing [pins] (ssr, trigger) or out-of-range values.\nHow to fix: Edit the TOML config and try again. Details: {err:#}"
        );
    }

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nHow to fix: Pass --config <FILE> or create etc/welder_config.toml. Details: {err:#}"
        );
    }

    if lower.contains("no mains voltage") {
        return "What happened: Self-check saw no mains voltage.\nLikely causes: Voltage sensor unplugged or mains absent.\nHow to fix: Check the ZMPT sensor and its supply.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Terminal status implied by an error, when it maps onto one.
pub fn status_for_error(err: &eyre::Report) -> Option<WeldStatus> {
    match err.downcast_ref::<WeldError>()? {
        WeldError::ZeroCrossTimeout { .. } => Some(WeldStatus::ZmptErr),
        WeldError::Hardware(_) | WeldError::HardwareFault(_) => Some(WeldStatus::HwErr),
        _ => None,
    }
}

/// Stable exit codes: zero-cross timeout 3, hardware fault 4, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<HwError>().is_some() {
        return EXIT_HW;
    }
    match status_for_error(err) {
        Some(WeldStatus::ZmptErr) => EXIT_ZMPT,
        Some(WeldStatus::HwErr) => EXIT_HW,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(we) = err.downcast_ref::<WeldError>() {
        return match we {
            WeldError::ZeroCrossTimeout { .. } => "ZeroCrossTimeout",
            WeldError::Hardware(_) => "Hardware",
            WeldError::HardwareFault(_) => "HardwareFault",
            WeldError::Config(_) => "Config",
            WeldError::State(_) => "State",
            WeldError::MalformedCommand(_) => "MalformedCommand",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    if err.downcast_ref::<Rejection>().is_some() {
        return "Rejected";
    }
    if err.downcast_ref::<HwError>().is_some() {
        return "Hardware";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({ "reason": reason_name(err), "message": humanize(err) });
    if let Some(status) = status_for_error(err) {
        obj["status"] = json!(status.as_str());
    }
    obj.to_string()
}
