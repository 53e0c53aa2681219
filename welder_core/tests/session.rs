mod common;

use std::sync::{Arc, Mutex};

use common::{MID, RigSetup, mains, ms, shared, welder, welder_with};
use welder_core::config::EngineCfg;
use welder_core::mocks::{RecordingSwitch, StepSignal};
use welder_core::{
    AutoSpotSettings, Command, CommandOutcome, CrossPhase, Notification, Rejection, SessionMonitor,
    SessionState, TriggerRequest, TriggerSource, WeldError, WeldMode, WeldSettings, WeldStatus,
};
use welder_traits::clock::TestClock;

fn remote(at_ms: u64) -> TriggerRequest {
    TriggerRequest::new(TriggerSource::Remote, at_ms)
}

fn with_settings(weld: WeldSettings) -> EngineCfg {
    EngineCfg {
        weld,
        ..EngineCfg::default()
    }
}

fn single(main: u32) -> WeldSettings {
    WeldSettings {
        mode: WeldMode::Single,
        main_pulse_ms: main,
        ..WeldSettings::default()
    }
}

fn smart() -> WeldSettings {
    WeldSettings {
        mode: WeldMode::Smart,
        ..WeldSettings::default()
    }
}

#[test]
fn single_mode_fires_one_pulse_then_reports_ready() {
    let (mut w, h) = welder(with_settings(single(100)));
    let report = w.request_weld(remote(0)).expect("accepted");
    assert_eq!(h.switch.on_intervals(), vec![ms(100)]);
    assert_eq!(report.status, WeldStatus::Ready);
    assert!(report.is_ok());
    assert!(report.energy.is_none());
    assert_eq!(
        h.drain(),
        vec![
            Notification::status(WeldStatus::Welding),
            Notification::status(WeldStatus::Ready)
        ]
    );
    assert_eq!(w.session_state(), SessionState::Idle);
    assert!(!h.switch.is_on());
}

#[test]
fn smart_mode_reports_pulse_and_learning_state() {
    let (mut w, h) = welder(with_settings(smart()));
    let report = w.request_weld(remote(0)).unwrap();
    let energy = report.energy.expect("energy report");
    let notes = h.drain();
    assert_eq!(notes.len(), 4, "{notes:?}");
    assert_eq!(notes[0], Notification::status(WeldStatus::Welding));
    match notes[1] {
        Notification::Pulse { pulse, energy: e } => {
            assert_eq!(pulse, 100);
            assert_eq!(e, energy.delivered_ws);
            assert!(e >= 150.0);
        }
        ref other => panic!("expected pulse notification, got {other:?}"),
    }
    assert_eq!(
        notes[2],
        Notification::Energy {
            suggested_energy: 150.0,
            locked_energy: 0.0
        }
    );
    assert_eq!(notes[3], Notification::status(WeldStatus::Ready));
}

#[test]
fn absent_mains_reports_zmpt_err_without_firing() {
    let clock = TestClock::new();
    let sampler = StepSignal::flat(shared(&clock), MID);
    let (mut w, h) = welder_with(clock, sampler, RigSetup::default());
    let report = w.request_weld(remote(0)).unwrap();
    assert_eq!(report.status, WeldStatus::ZmptErr);
    assert_eq!(
        report.fault,
        Some(WeldError::ZeroCrossTimeout {
            phase: CrossPhase::Falling
        })
    );
    assert!(h.switch.events().is_empty());
    assert_eq!(
        h.drain(),
        vec![
            Notification::status(WeldStatus::Welding),
            Notification::status(WeldStatus::ZmptErr)
        ]
    );
    assert_eq!(w.session_state(), SessionState::Idle);
}

#[test]
fn aborted_double_weld_reports_the_pre_pulse() {
    let clock = TestClock::new();
    // One clean cycle, then the mains vanishes high.
    let sampler = StepSignal::new(
        shared(&clock),
        MID + 1000,
        vec![(ms(10), MID - 1000), (ms(20), MID + 1000)],
    );
    let cfg = with_settings(WeldSettings {
        mode: WeldMode::Double,
        pre_pulse_ms: 20,
        gap_ms: 40,
        main_pulse_ms: 80,
        ..WeldSettings::default()
    });
    let (mut w, h) = welder_with(
        clock,
        sampler,
        RigSetup {
            cfg,
            ..RigSetup::default()
        },
    );
    let report = w.request_weld(remote(0)).unwrap();
    assert_eq!(report.status, WeldStatus::ZmptErr);
    assert_eq!(report.pulses.len(), 1);
    assert_eq!(report.pulses[0].index, 1);
    assert_eq!(h.switch.on_intervals(), vec![ms(20)]);
    assert!(!h.switch.is_on());
}

#[test]
fn switch_driver_fault_reports_hw_err() {
    let clock = TestClock::new();
    let sampler = mains(&clock);
    let switch = RecordingSwitch::new(shared(&clock)).failing_on();
    let (mut w, h) = welder_with(
        clock,
        sampler,
        RigSetup {
            switch: Some(switch),
            ..RigSetup::default()
        },
    );
    let report = w.request_weld(remote(0)).unwrap();
    assert_eq!(report.status, WeldStatus::HwErr);
    assert!(matches!(report.fault, Some(WeldError::Hardware(_))));
    assert!(!h.switch.is_on());
    assert_eq!(w.session_state(), SessionState::Idle);
}

#[test]
fn session_is_visible_as_firing_while_the_switch_is_on() {
    let clock = TestClock::new();
    let sampler = mains(&clock);
    let slot: Arc<Mutex<Option<SessionMonitor>>> = Arc::new(Mutex::new(None));
    let seen: Arc<Mutex<Vec<SessionState>>> = Arc::new(Mutex::new(Vec::new()));
    let switch = {
        let slot = Arc::clone(&slot);
        let seen = Arc::clone(&seen);
        RecordingSwitch::new(shared(&clock)).with_on_hook(move || {
            if let Some(m) = slot.lock().unwrap().as_ref() {
                seen.lock().unwrap().push(m.state());
            }
        })
    };
    let (mut w, _h) = welder_with(
        clock,
        sampler,
        RigSetup {
            switch: Some(switch),
            cfg: with_settings(WeldSettings {
                mode: WeldMode::Double,
                ..WeldSettings::default()
            }),
            ..RigSetup::default()
        },
    );
    *slot.lock().unwrap() = Some(w.monitor());
    w.request_weld(remote(0)).unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![SessionState::Firing, SessionState::Firing]
    );
    assert!(!w.monitor().is_welding());
}

#[test]
fn queued_settings_apply_at_the_next_session() {
    let (mut w, h) = welder(with_settings(single(100)));
    w.update_weld_settings(single(50));
    assert_eq!(w.settings().main_pulse_ms, 100);
    assert!(w.pending_settings().is_some());

    w.request_weld(remote(0)).unwrap();
    assert_eq!(w.settings().main_pulse_ms, 50);
    assert!(w.pending_settings().is_none());
    assert_eq!(h.switch.on_intervals(), vec![ms(50)]);
}

#[test]
fn learned_lock_survives_queued_settings() {
    let (mut w, h) = welder(with_settings(smart()));
    let cmd = Command::parse(
        r#"{"type":"update_weld_settings","mode":"smart","pre":0,"gap":0,"main":0,"target":200}"#,
    )
    .unwrap();
    assert!(matches!(w.handle_command(cmd), CommandOutcome::SettingsQueued));
    w.feedback_reject();
    w.feedback_accept();
    assert_eq!(w.feedback_state().locked_ws, 160.0);
    h.drain();

    let report = w.request_weld(remote(0)).unwrap();
    assert_eq!(w.settings().target_energy_ws, 200.0);
    assert_eq!(w.feedback_state().suggested_ws, 160.0);
    assert_eq!(w.feedback_state().locked_ws, 160.0);
    let delivered = report.energy.expect("energy report").delivered_ws;
    assert!(delivered >= 160.0 && delivered < 200.0, "delivered {delivered}");
    assert!(h.drain().contains(&Notification::Energy {
        suggested_energy: 160.0,
        locked_energy: 160.0
    }));
}

#[test]
fn update_command_without_target_keeps_the_current_one() {
    let (mut w, _h) = welder(with_settings(smart()));
    let cmd = Command::parse(
        r#"{"type":"update_weld_settings","mode":"smart","pre":0,"gap":0,"main":0}"#,
    )
    .unwrap();
    assert!(matches!(w.handle_command(cmd), CommandOutcome::SettingsQueued));
    assert_eq!(w.pending_settings().unwrap().target_energy_ws, 150.0);
}

#[test]
fn feedback_commands_publish_the_learning_state() {
    let (mut w, h) = welder(EngineCfg::default());
    match w.handle_command(Command::FeedbackWeak) {
        CommandOutcome::Feedback(s) => assert_eq!(s.suggested_ws, 160.0),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(
        h.drain(),
        vec![Notification::Energy {
            suggested_energy: 160.0,
            locked_energy: 0.0
        }]
    );
}

#[test]
fn remote_spot_is_refused_while_autospot_is_enabled() {
    let (mut w, h) = welder(EngineCfg::default());
    w.update_autospot(AutoSpotSettings {
        enabled: true,
        ..AutoSpotSettings::default()
    });
    match w.handle_command(Command::Spot) {
        CommandOutcome::Weld(Err(r)) => assert_eq!(r, Rejection::AutoSpotActive),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(h.switch.events().is_empty());
    assert!(h.drain().is_empty());
}

#[test]
fn recalibrate_remeasures_the_midpoint() {
    let clock = TestClock::new();
    let sampler = StepSignal::flat(shared(&clock), 1900);
    let (mut w, _h) = welder_with(clock, sampler, RigSetup::default());
    assert_eq!(w.calibration().zero_cross_midpoint, MID);
    let state = w.recalibrate().unwrap();
    assert_eq!(state.zero_cross_midpoint, 1900);
    assert_eq!(w.calibration(), state);
}
