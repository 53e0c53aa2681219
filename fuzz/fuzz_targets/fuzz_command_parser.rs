#![no_main]
use libfuzzer_sys::fuzz_target;
use welder_core::Command;

// Remote frames are untrusted: anything accepted must already be in range.
fuzz_target!(|data: &str| {
    match Command::parse(data) {
        Ok(Command::UpdateWeldSettings { target: Some(t), .. }) => {
            assert!(t.is_finite() && t >= 0.0);
        }
        Ok(Command::UpdateAutospotSettings {
            trig_thresh,
            v_cutoff,
            ..
        }) => {
            assert!(trig_thresh > 0.0 && v_cutoff >= 0.0);
        }
        _ => {}
    }
});
