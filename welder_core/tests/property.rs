mod common;

use common::{RigSetup, mains, ms, welder_with};
use proptest::prelude::*;
use welder_core::config::{EnergyCfg, EngineCfg};
use welder_core::{TriggerRequest, TriggerSource, WeldMode, WeldSettings, WeldStatus};
use welder_traits::PowerReading;
use welder_traits::clock::TestClock;

fn mode() -> impl Strategy<Value = WeldMode> {
    prop_oneof![
        Just(WeldMode::Single),
        Just(WeldMode::Double),
        Just(WeldMode::Triple),
        Just(WeldMode::Smart),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// No pulse in any mode outlives the energy ceiling, and the switch is
    /// always off once the session returns.
    #[test]
    fn on_time_never_exceeds_the_ceiling(
        mode in mode(),
        pre in 0u32..3000,
        gap in 0u32..200,
        main in 0u32..3000,
        target in 0.0f32..5000.0,
        vrms in 0.0f32..400.0,
        irms in 0.0f32..50.0,
        ceiling_ms in 1u64..1500,
        window_ms in 1u64..200,
    ) {
        let clock = TestClock::new();
        let sampler = mains(&clock);
        let cfg = EngineCfg {
            energy: EnergyCfg {
                max_duration_ms: ceiling_ms,
                window_ms,
                ..EnergyCfg::default()
            },
            weld: WeldSettings {
                mode,
                pre_pulse_ms: pre,
                gap_ms: gap,
                main_pulse_ms: main,
                target_energy_ws: target,
            },
            ..EngineCfg::default()
        };
        let (mut w, h) = welder_with(
            clock,
            sampler,
            RigSetup {
                cfg,
                loaded: PowerReading::new(vrms, irms),
                switch: None,
            },
        );
        let report = w
            .request_weld(TriggerRequest::new(TriggerSource::Remote, 0))
            .unwrap();
        prop_assert_eq!(report.status, WeldStatus::Ready);
        for on in h.switch.on_intervals() {
            prop_assert!(on <= ms(ceiling_ms), "pulse {:?} over ceiling {}ms", on, ceiling_ms);
        }
        prop_assert!(!h.switch.is_on());
        prop_assert_eq!(h.switch.overlapping_on_count(), 0);
    }
}
