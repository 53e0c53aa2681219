#![no_main]
use libfuzzer_sys::fuzz_target;

// Parse and validation errors are fine; panics are not.
fuzz_target!(|data: &str| {
    if let Ok(cfg) = welder_config::load_toml(data)
        && cfg.validate().is_ok()
    {
        // Anything that validates must also convert into engine config.
        let _ = welder_core::EngineCfg::from(&cfg);
    }
});
