mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use common::{RigSetup, mains, ms, shared, welder, welder_with};
use crossbeam_channel::unbounded;
use welder_core::config::{EngineCfg, LoopCfg};
use welder_core::mocks::RecordingSwitch;
use welder_core::{
    AutoSpotSettings, ControlLoop, Notification, TriggerSource, WeldMode, WeldSettings, WeldStatus,
    Welder, WelderLoop, command_channel,
};
use welder_traits::clock::TestClock;

const SPOT: &str = r#"{"type":"spot"}"#;

fn quiet_loop_cfg() -> LoopCfg {
    LoopCfg {
        telemetry_ms: 0,
        ..LoopCfg::default()
    }
}

fn single(main: u32) -> EngineCfg {
    EngineCfg {
        weld: WeldSettings {
            mode: WeldMode::Single,
            main_pulse_ms: main,
            ..WeldSettings::default()
        },
        ..EngineCfg::default()
    }
}

fn control(
    w: Welder,
    cfg: LoopCfg,
) -> (
    WelderLoop,
    crossbeam_channel::Sender<String>,
    crossbeam_channel::Receiver<Notification>,
) {
    let (tx, rx) = command_channel();
    let (ttx, trx) = unbounded();
    (ControlLoop::new(w, rx, Box::new(ttx), cfg), tx, trx)
}

#[test]
fn malformed_frames_are_dropped_silently() {
    let (w, h) = welder(single(100));
    let (mut lp, tx, _telemetry) = control(w, quiet_loop_cfg());
    for frame in ["garbage", "{}", r#"{"type":"warp"}"#, SPOT, "[1,2"] {
        tx.send(frame.to_string()).unwrap();
    }
    let fired = lp.tick();
    assert_eq!(fired.len(), 1);
    assert_eq!(
        h.drain(),
        vec![
            Notification::status(WeldStatus::Welding),
            Notification::status(WeldStatus::Ready)
        ]
    );
}

#[test]
fn settings_sent_during_a_weld_apply_to_the_next_one() {
    let clock = TestClock::new();
    let sampler = mains(&clock);
    let (tx, rx) = command_channel();
    let sent = Arc::new(AtomicBool::new(false));
    let switch = {
        let tx = tx.clone();
        let sent = Arc::clone(&sent);
        RecordingSwitch::new(shared(&clock)).with_on_hook(move || {
            if !sent.swap(true, Ordering::SeqCst) {
                tx.send(
                    r#"{"type":"update_weld_settings","mode":"single","pre":0,"gap":0,"main":50}"#
                        .to_string(),
                )
                .unwrap();
            }
        })
    };
    let (w, h) = welder_with(
        clock,
        sampler,
        RigSetup {
            cfg: single(100),
            switch: Some(switch),
            ..RigSetup::default()
        },
    );
    let mut lp = ControlLoop::new(w, rx, Box::new(welder_core::protocol::Discard), quiet_loop_cfg());

    tx.send(SPOT.to_string()).unwrap();
    lp.tick();
    assert_eq!(h.switch.on_intervals(), vec![ms(100)]);
    assert_eq!(lp.welder().settings().main_pulse_ms, 100);
    assert_eq!(lp.welder().pending_settings().map(|s| s.main_pulse_ms), Some(50));

    tx.send(SPOT.to_string()).unwrap();
    lp.tick();
    assert_eq!(h.switch.on_intervals(), vec![ms(100), ms(50)]);
}

#[test]
fn switch_and_remote_in_one_tick_fire_back_to_back() {
    let (w, h) = welder(single(80));
    let (mut lp, tx, _telemetry) = control(w, quiet_loop_cfg());
    let at = lp.welder().now_ms();
    lp.switch_edge().signal(at);
    tx.send(SPOT.to_string()).unwrap();
    let fired = lp.tick();
    let sources: Vec<_> = fired.iter().map(|r| r.source).collect();
    assert_eq!(sources, vec![TriggerSource::Switch, TriggerSource::Remote]);
    assert_eq!(h.switch.on_intervals(), vec![ms(80), ms(80)]);
    assert_eq!(h.switch.overlapping_on_count(), 0);
}

#[test]
fn autospot_suppresses_manual_sources_and_fires_once_per_contact() {
    let (w, h) = welder(single(60));
    let (mut lp, tx, _telemetry) = control(w, quiet_loop_cfg());
    lp.welder_mut().update_autospot(AutoSpotSettings {
        enabled: true,
        ..AutoSpotSettings::default()
    });
    h.set_contact_current(1.0);

    let at = lp.welder().now_ms();
    lp.switch_edge().signal(at);
    tx.send(SPOT.to_string()).unwrap();
    let fired = lp.tick();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].source, TriggerSource::Auto);

    // Electrodes still held: no re-fire.
    for _ in 0..5 {
        assert!(lp.tick().is_empty());
    }

    h.set_contact_current(0.0);
    assert!(lp.tick().is_empty());
    h.set_contact_current(1.0);
    let fired = lp.tick();
    assert_eq!(fired.len(), 1);
    assert_eq!(h.switch.on_intervals(), vec![ms(60), ms(60)]);
    assert_eq!(h.switch.overlapping_on_count(), 0);
}

#[test]
fn telemetry_is_rate_limited() {
    let (w, h) = welder(EngineCfg::default());
    let (mut lp, _tx, telemetry) = control(w, LoopCfg::default());
    while h.clock.offset() < ms(2500) {
        lp.tick();
    }
    let notes: Vec<_> = telemetry.try_iter().collect();
    assert_eq!(notes.len(), 3, "{notes:?}");
    assert!(notes.iter().all(|n| matches!(n, Notification::Telemetry { .. })));
}

#[test]
fn run_stops_when_the_transport_disconnects() {
    let (w, h) = welder(single(40));
    let (mut lp, tx, _telemetry) = control(w, quiet_loop_cfg());
    tx.send(SPOT.to_string()).unwrap();
    drop(tx);
    lp.run(&AtomicBool::new(false)).unwrap();
    assert!(lp.is_disconnected());
    assert_eq!(h.switch.on_intervals(), vec![ms(40)]);
    assert!(!h.switch.is_on());
}

#[test]
fn run_honours_a_preset_shutdown_flag() {
    let (w, h) = welder(single(40));
    let (mut lp, tx, _telemetry) = control(w, quiet_loop_cfg());
    tx.send(SPOT.to_string()).unwrap();
    lp.run(&AtomicBool::new(true)).unwrap();
    assert!(h.switch.events().is_empty());
}
