//! Operator-feedback hill climb for the Smart-mode energy target.

use crate::config::LearningCfg;

/// Snapshot of the learned energy target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyFeedbackState {
    pub suggested_ws: f32,
    /// 0 means unlocked.
    pub locked_ws: f32,
}

/// Monotonic hill climb: a weak weld raises the suggestion by a fixed step,
/// a good weld locks it. The suggestion never goes down.
#[derive(Debug, Clone)]
pub struct AdaptiveLearningController {
    cfg: LearningCfg,
    suggested_ws: f32,
    locked_ws: f32,
}

impl AdaptiveLearningController {
    pub fn new(cfg: LearningCfg) -> Self {
        let suggested_ws = clamp_ws(cfg.initial_ws, cfg.max_ws);
        Self {
            cfg,
            suggested_ws,
            locked_ws: 0.0,
        }
    }

    pub fn on_accept(&mut self) {
        self.locked_ws = self.suggested_ws;
        tracing::info!(locked_ws = self.locked_ws, "energy target locked");
    }

    pub fn on_reject(&mut self) {
        self.locked_ws = 0.0;
        self.suggested_ws = (self.suggested_ws + self.cfg.step_ws).min(self.cfg.max_ws);
        tracing::info!(suggested_ws = self.suggested_ws, "energy target raised");
    }

    /// Energy the next Smart weld aims for.
    pub fn target_ws(&self) -> f32 {
        if self.locked_ws > 0.0 {
            self.locked_ws
        } else {
            self.suggested_ws
        }
    }

    pub fn state(&self) -> EnergyFeedbackState {
        EnergyFeedbackState {
            suggested_ws: self.suggested_ws,
            locked_ws: self.locked_ws,
        }
    }
}

fn clamp_ws(ws: f32, max_ws: f32) -> f32 {
    if ws.is_finite() { ws.clamp(0.0, max_ws) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctrl() -> AdaptiveLearningController {
        AdaptiveLearningController::new(LearningCfg::default())
    }

    #[test]
    fn starts_unlocked_at_initial() {
        let c = ctrl();
        assert_eq!(
            c.state(),
            EnergyFeedbackState {
                suggested_ws: 150.0,
                locked_ws: 0.0
            }
        );
        assert_eq!(c.target_ws(), 150.0);
    }
}
