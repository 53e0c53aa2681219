#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Weld-firing engine (hardware-agnostic).
//!
//! All hardware access goes through the `welder_traits` seams: `Switch`,
//! `SampleSource` and `PowerMeter`. Time comes from an injected `Clock`, so
//! every timing path runs deterministically under `TestClock`.
//!
//! ## Architecture
//!
//! - **Phase sync**: busy-poll zero-cross detection (`phase`)
//! - **Energy**: windowed or Riemann integration up to a hard on-time ceiling (`energy`)
//! - **Sequencing**: Single, Double, Triple and Smart pulse groups (`sequencer`)
//! - **Learning**: operator-feedback hill climb for the Smart target (`learning`)
//! - **Arbitration**: switch, remote and auto-spot triggers (`trigger`)
//! - **Session**: the single-writer owner of weld state (`session`, `gate`)
//! - **Control loop**: tick-driven servicing of edges, commands and telemetry (`control`)

pub mod builder;
pub mod calibration;
pub mod config;
pub mod control;
pub mod conversions;
pub mod energy;
pub mod error;
pub mod gate;
pub mod hw_error;
pub mod learning;
pub mod mocks;
pub mod phase;
pub mod protocol;
pub mod rig;
pub mod sequencer;
pub mod session;
pub mod settings;
pub mod trigger;
pub mod util;

pub use builder::{Missing, Set, Welder, WelderBuilder};
pub use calibration::CalibrationState;
pub use config::{EngineCfg, LoopCfg};
pub use control::{ControlLoop, WelderLoop, command_channel};
pub use energy::{EnergyReport, EnergyTermination};
pub use error::{BuildError, CrossPhase, Result, WeldError};
pub use gate::{SessionMonitor, SessionState};
pub use learning::EnergyFeedbackState;
pub use protocol::{Command, Notification, Notifier, WeldStatus};
pub use rig::WeldRig;
pub use session::{CommandOutcome, WeldReport, WeldSessionController};
pub use settings::{AutoSpotSettings, WeldMode, WeldSettings};
pub use trigger::{Rejection, SwitchEdge, TriggerRequest, TriggerSource};
