//! Command bodies: serve the control loop, fire one weld, self-check.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use eyre::WrapErr;
use welder_config::Config;
use welder_core::protocol::Discard;
use welder_core::{
    ControlLoop, EngineCfg, LoopCfg, Notification, TriggerRequest, TriggerSource, WeldReport,
    command_channel,
};

use crate::cli::{RtOpts, WeldOverrides};
use crate::hw::{assemble, attach_trigger};
use crate::rt::setup_rt_once;

/// Forward non-empty stdin lines as raw frames until EOF or the loop goes away.
fn read_commands(input: impl BufRead, tx: &Sender<String>) {
    for line in input.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "command input failed");
                break;
            }
        };
        let frame = line.trim();
        if frame.is_empty() {
            continue;
        }
        if tx.send(frame.to_owned()).is_err() {
            break;
        }
    }
    tracing::debug!("command input closed");
}

fn write_notifications(
    out: &mut impl Write,
    rx: impl IntoIterator<Item = Notification>,
) -> io::Result<()> {
    for n in rx {
        writeln!(out, "{}", n.to_json())?;
        out.flush()?;
    }
    Ok(())
}

/// Run the control loop with stdin as the inbound transport and stdout as
/// the outbound one. Returns on EOF, Ctrl-C or a fatal error; the switch is
/// off on every exit path.
pub fn run_serve(cfg: &Config, rt: &RtOpts, shutdown: Arc<AtomicBool>) -> eyre::Result<()> {
    setup_rt_once(rt);

    let (out_tx, out_rx) = crossbeam_channel::unbounded::<Notification>();
    let writer = thread::Builder::new()
        .name("notify-out".into())
        .spawn(move || write_notifications(&mut io::stdout().lock(), out_rx))
        .wrap_err("spawn notification writer")?;

    let (welder, backend) = assemble(cfg, EngineCfg::from(cfg), out_tx.clone())?;
    let (cmd_tx, cmd_rx) = command_channel();
    thread::Builder::new()
        .name("cmd-in".into())
        .spawn(move || read_commands(io::stdin().lock(), &cmd_tx))
        .wrap_err("spawn command reader")?;

    let mut lp = ControlLoop::new(
        welder,
        cmd_rx,
        Box::new(out_tx),
        LoopCfg::from(&cfg.control_loop),
    );
    let _trigger = attach_trigger(cfg, &lp, &backend)?;
    tracing::info!(
        backend = backend.name(),
        mode = %lp.welder().settings().mode,
        "serving commands on stdin"
    );

    let result = lp.run(&shutdown);
    // Dropping the loop closes the notification channel.
    drop(lp);
    match writer.join() {
        Ok(w) => w.wrap_err("write notifications")?,
        Err(_) => eyre::bail!("notification writer panicked"),
    }
    result
}

/// Fire one remote-triggered weld and print its notifications.
///
/// A weld that ends in `ZMPT ERR` or `HW ERR` comes back as the typed
/// `WeldError`, so the exit code reflects it.
pub fn run_fire(cfg: &Config, overrides: &WeldOverrides, rt: &RtOpts) -> eyre::Result<WeldReport> {
    setup_rt_once(rt);

    let mut engine = EngineCfg::from(cfg);
    engine.weld = overrides.apply(engine.weld);
    let target = engine.weld.target_energy_ws;
    if !(target.is_finite() && target >= 0.0 && target <= engine.learning.max_ws) {
        eyre::bail!(
            "invalid configuration: --target-ws must be in [0, {}]",
            engine.learning.max_ws
        );
    }
    engine.learning.initial_ws = target;

    let (tx, rx) = crossbeam_channel::unbounded::<Notification>();
    let (mut welder, backend) = assemble(cfg, engine, tx)?;
    tracing::info!(
        backend = backend.name(),
        mode = %welder.settings().mode,
        "firing one weld"
    );

    let at = welder.now_ms();
    let outcome = welder.request_weld(TriggerRequest::new(TriggerSource::Remote, at));
    welder.force_off();
    drop(welder);

    write_notifications(&mut io::stdout().lock(), rx.try_iter()).wrap_err("write notifications")?;

    let report = outcome.map_err(eyre::Report::new)?;
    if let Some(fault) = report.fault.clone() {
        return Err(eyre::Report::new(fault));
    }
    tracing::info!(
        pulses = report.pulses.len(),
        delivered_ws = report.energy.as_ref().map(|e| e.delivered_ws),
        "weld complete"
    );
    Ok(report)
}

/// Calibrate, take one reading and make sure the switch is off.
pub fn self_check(cfg: &Config) -> eyre::Result<String> {
    let (mut welder, backend) = assemble(cfg, EngineCfg::from(cfg), Discard)?;
    let cal = welder.calibration();
    let window = Duration::from_millis(cfg.energy.window_ms.max(1));
    let reading = welder.measure(window)?;
    welder.force_off();
    if reading.voltage_rms < 1.0 {
        eyre::bail!("self-check: no mains voltage on the sense channel");
    }
    Ok(format!(
        "self-check ok: backend={} midpoint={} current_offset={} vrms={:.1} irms={:.2}",
        backend.name(),
        cal.zero_cross_midpoint,
        cal.current_offset,
        reading.voltage_rms,
        reading.current_rms
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use welder_core::WeldStatus;

    #[test]
    fn blank_lines_are_skipped_and_frames_trimmed() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let input = Cursor::new("  {\"type\":\"spot\"}  \n\n\t\n{\"type\":\"feedback_ok\"}\n");
        read_commands(input, &tx);
        let frames: Vec<String> = rx.try_iter().collect();
        assert_eq!(frames, vec![r#"{"type":"spot"}"#, r#"{"type":"feedback_ok"}"#]);
    }

    #[test]
    fn reader_stops_once_the_loop_is_gone() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(rx);
        read_commands(Cursor::new("a\nb\nc\n"), &tx);
    }

    #[test]
    fn notifications_are_one_json_object_per_line() {
        let mut out = Vec::new();
        write_notifications(
            &mut out,
            vec![
                Notification::status(WeldStatus::Welding),
                Notification::Telemetry {
                    vrms: 230.0,
                    irms: 0.5,
                },
            ],
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, vec![r#"{"status":"WELDING..."}"#, r#"{"vrms":230.0,"irms":0.5}"#]);
    }
}
