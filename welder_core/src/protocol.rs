//! Remote command and notification encoding.
//!
//! Inbound frames are JSON objects tagged by `"type"`. Outbound notifications
//! are untagged JSON objects whose keys identify them.

use serde::{Deserialize, Serialize};

use crate::error::WeldError;
use crate::settings::WeldMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    UpdateWeldSettings {
        mode: WeldMode,
        pre: u32,
        gap: u32,
        main: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<f32>,
    },
    UpdateAutospotSettings {
        enabled: bool,
        #[serde(rename = "trigThresh")]
        trig_thresh: f32,
        #[serde(rename = "vCutoff")]
        v_cutoff: f32,
        #[serde(rename = "iLimit", default, skip_serializing_if = "Option::is_none")]
        i_limit: Option<f32>,
    },
    Spot,
    FeedbackOk,
    FeedbackWeak,
    Recalibrate,
}

impl Command {
    /// Parse and range-check one inbound frame.
    pub fn parse(frame: &str) -> Result<Self, WeldError> {
        let cmd: Command = serde_json::from_str(frame.trim())
            .map_err(|e| WeldError::MalformedCommand(e.to_string()))?;
        cmd.check()?;
        Ok(cmd)
    }

    fn check(&self) -> Result<(), WeldError> {
        let bad = |m: &str| Err(WeldError::MalformedCommand(m.to_string()));
        match *self {
            Command::UpdateWeldSettings {
                target: Some(t), ..
            } if !(t.is_finite() && t >= 0.0) => bad("target must be >= 0"),
            Command::UpdateAutospotSettings {
                trig_thresh,
                v_cutoff,
                i_limit,
                ..
            } => {
                if !(trig_thresh.is_finite() && trig_thresh > 0.0) {
                    return bad("trigThresh must be > 0");
                }
                if !(v_cutoff.is_finite() && v_cutoff >= 0.0) {
                    return bad("vCutoff must be >= 0");
                }
                if let Some(l) = i_limit
                    && !(l.is_finite() && l >= 0.0)
                {
                    return bad("iLimit must be >= 0");
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Terminal and progress status strings shown by the remote UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeldStatus {
    #[serde(rename = "WELDING...")]
    Welding,
    #[serde(rename = "READY")]
    Ready,
    /// Zero-cross timeout: mains signal absent or midpoint drifted.
    #[serde(rename = "ZMPT ERR")]
    ZmptErr,
    #[serde(rename = "HW ERR")]
    HwErr,
}

impl WeldStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WeldStatus::Welding => "WELDING...",
            WeldStatus::Ready => "READY",
            WeldStatus::ZmptErr => "ZMPT ERR",
            WeldStatus::HwErr => "HW ERR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Notification {
    Status {
        status: WeldStatus,
    },
    Telemetry {
        vrms: f32,
        irms: f32,
    },
    /// Smart-mode pulse result: on-time in ms and delivered energy in Ws.
    Pulse {
        pulse: u64,
        energy: f32,
    },
    Energy {
        suggested_energy: f32,
        locked_energy: f32,
    },
}

impl Notification {
    pub fn status(status: WeldStatus) -> Self {
        Notification::Status { status }
    }

    pub fn to_json(&self) -> String {
        // Every variant is plain numbers and fixed strings.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Sink for outbound notifications.
pub trait Notifier {
    fn notify(&mut self, n: Notification);
}

impl Notifier for Vec<Notification> {
    fn notify(&mut self, n: Notification) {
        self.push(n);
    }
}

impl Notifier for crossbeam_channel::Sender<Notification> {
    fn notify(&mut self, n: Notification) {
        // A gone observer must never stall the control loop.
        let _ = self.try_send(n);
    }
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl Notifier for Discard {
    fn notify(&mut self, _n: Notification) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_command() {
        assert_eq!(
            Command::parse(r#"{"type":"update_weld_settings","mode":"double","pre":20,"gap":40,"main":80}"#)
                .unwrap(),
            Command::UpdateWeldSettings {
                mode: WeldMode::Double,
                pre: 20,
                gap: 40,
                main: 80,
                target: None
            }
        );
        assert_eq!(
            Command::parse(
                r#"{"type":"update_autospot_settings","enabled":true,"trigThresh":0.8,"vCutoff":190,"iLimit":20}"#
            )
            .unwrap(),
            Command::UpdateAutospotSettings {
                enabled: true,
                trig_thresh: 0.8,
                v_cutoff: 190.0,
                i_limit: Some(20.0)
            }
        );
        assert_eq!(Command::parse(r#"{"type":"spot"}"#).unwrap(), Command::Spot);
        assert_eq!(
            Command::parse(r#"{"type":"feedback_ok"}"#).unwrap(),
            Command::FeedbackOk
        );
        assert_eq!(
            Command::parse(r#"{"type":"feedback_weak"}"#).unwrap(),
            Command::FeedbackWeak
        );
        assert_eq!(
            Command::parse(r#"{"type":"recalibrate"}"#).unwrap(),
            Command::Recalibrate
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        for frame in [
            "",
            "not json",
            r#"{"type":"nope"}"#,
            r#"{"type":"update_weld_settings","mode":"quad","pre":1,"gap":1,"main":1}"#,
            r#"{"type":"update_weld_settings","mode":"single","pre":-1,"gap":1,"main":1}"#,
            r#"{"type":"update_autospot_settings","enabled":true,"trigThresh":0,"vCutoff":0}"#,
            r#"{"type":"update_autospot_settings","enabled":true,"trigThresh":1,"vCutoff":-5}"#,
        ] {
            assert!(
                matches!(Command::parse(frame), Err(WeldError::MalformedCommand(_))),
                "accepted {frame:?}"
            );
        }
    }

    #[test]
    fn notifications_encode_untagged() {
        assert_eq!(
            Notification::status(WeldStatus::Welding).to_json(),
            r#"{"status":"WELDING..."}"#
        );
        assert_eq!(
            Notification::status(WeldStatus::ZmptErr).to_json(),
            r#"{"status":"ZMPT ERR"}"#
        );
        assert_eq!(
            Notification::Pulse {
                pulse: 120,
                energy: 150.5
            }
            .to_json(),
            r#"{"pulse":120,"energy":150.5}"#
        );
        assert_eq!(
            Notification::Energy {
                suggested_energy: 160.0,
                locked_energy: 0.0
            }
            .to_json(),
            r#"{"suggested_energy":160.0,"locked_energy":0.0}"#
        );
    }
}
