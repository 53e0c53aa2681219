//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;
use welder_core::{WeldMode, WeldSettings};

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "welder", version, about = "Spot-welder controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/welder_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        #[cfg(target_os = "linux")]
        {
            return RtLock::Current;
        }
        #[allow(unreachable_code)]
        RtLock::None
    }
}

/// Real-time knobs shared by the commands that drive the switch.
#[derive(Args, Debug, Clone, Copy)]
pub struct RtOpts {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on supported OSes.\n\nLinux: Attempts SCHED_FIFO priority, pins to one CPU, and calls mlockall to keep the process resident. Pulse edges are timed by sleeping, so scheduler jitter lands directly on the weld. May require CAP_SYS_NICE/CAP_IPC_LOCK or root.\n\nOther OSes: ignored with a warning."
    )]
    pub rt: bool,
    /// Real-time priority for SCHED_FIFO on Linux (1..=max)
    #[arg(
        long,
        value_name = "PRIO",
        long_help = "SCHED_FIFO priority when --rt is enabled (Linux only). Range is platform-defined (usually 1..=99); out-of-range values are clamped. Defaults to the maximum."
    )]
    pub rt_prio: Option<i32>,
    /// Select memory locking mode for --rt: none, current, or all
    #[arg(
        long,
        value_enum,
        value_name = "MODE",
        long_help = "Select memory locking mode when --rt is enabled.\n- none: do not lock memory.\n- current: lock currently resident pages (mlockall(MCL_CURRENT)).\n- all: lock current and future pages (mlockall(MCL_CURRENT|MCL_FUTURE)).\nDefault: current on Linux."
    )]
    pub rt_lock: Option<RtLock>,
    /// CPU index to pin the process to (Linux only). Defaults to 0.
    #[arg(
        long,
        value_name = "CPU",
        long_help = "Select the CPU index to pin the process to when --rt is enabled (Linux only). Defaults to 0. The value must be allowed by the current affinity mask; otherwise affinity is left unchanged and a warning is logged."
    )]
    pub rt_cpu: Option<usize>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ModeArg {
    Single,
    Double,
    Triple,
    Smart,
}

impl From<ModeArg> for WeldMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Single => WeldMode::Single,
            ModeArg::Double => WeldMode::Double,
            ModeArg::Triple => WeldMode::Triple,
            ModeArg::Smart => WeldMode::Smart,
        }
    }
}

/// One-shot overrides of the boot weld settings.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct WeldOverrides {
    /// Weld mode (defaults to `[weld] mode`)
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    /// Pre-pulse length in ms
    #[arg(long, value_name = "MS")]
    pub pre_ms: Option<u32>,
    /// Gap between pulses in ms
    #[arg(long, value_name = "MS")]
    pub gap_ms: Option<u32>,
    /// Main pulse length in ms
    #[arg(long, value_name = "MS")]
    pub main_ms: Option<u32>,
    /// Smart-mode energy target in watt-seconds
    #[arg(long, value_name = "WS")]
    pub target_ws: Option<f32>,
}

impl WeldOverrides {
    pub fn apply(&self, mut s: WeldSettings) -> WeldSettings {
        if let Some(m) = self.mode {
            s.mode = m.into();
        }
        if let Some(v) = self.pre_ms {
            s.pre_pulse_ms = v;
        }
        if let Some(v) = self.gap_ms {
            s.gap_ms = v;
        }
        if let Some(v) = self.main_ms {
            s.main_pulse_ms = v;
        }
        if let Some(v) = self.target_ws {
            s.target_energy_ws = v;
        }
        s
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve commands from stdin and stream notifications to stdout until EOF or Ctrl-C
    Run {
        #[command(flatten)]
        rt: RtOpts,
    },
    /// Fire a single weld now and exit
    Fire {
        #[command(flatten)]
        weld: WeldOverrides,
        #[command(flatten)]
        rt: RtOpts,
    },
    /// Calibrate and take one reading (hardware presence / sim ok)
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_given_fields() {
        let o = WeldOverrides {
            mode: Some(ModeArg::Triple),
            main_ms: Some(120),
            ..WeldOverrides::default()
        };
        let s = o.apply(WeldSettings::default());
        assert_eq!(s.mode, WeldMode::Triple);
        assert_eq!(s.main_pulse_ms, 120);
        assert_eq!(s.pre_pulse_ms, WeldSettings::default().pre_pulse_ms);
        assert_eq!(s.gap_ms, WeldSettings::default().gap_ms);
    }

    #[test]
    fn parses_fire_with_rt_flags() {
        let cli = Cli::try_parse_from([
            "welder", "fire", "--mode", "smart", "--target-ws", "200", "--rt", "--rt-lock", "all",
        ])
        .unwrap();
        match cli.cmd {
            Commands::Fire { weld, rt } => {
                assert_eq!(weld.mode, Some(ModeArg::Smart));
                assert_eq!(weld.target_ws, Some(200.0));
                assert!(rt.rt);
                assert_eq!(rt.rt_lock, Some(RtLock::All));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
