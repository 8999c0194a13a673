use serde::{Deserialize, Serialize};

use super::distance::{estimate, round_for_display, CalibrationProfile};
use crate::models::{DetectionBatch, Eye, EyeStatus};

/// Whether calibration readiness blocks the start of testing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum GatePolicy {
    /// Readiness is reported but never blocks.
    #[default]
    Soft,
    /// Testing may only start when ready, unless the caller forces it.
    Enforced,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub eye: Eye,
    pub distance_cm: Option<f64>,
    pub eye_status: EyeStatus,
    pub distance_ok: bool,
    pub eye_isolated: bool,
}

impl Readiness {
    pub fn evaluate(
        eye: Eye,
        batch: &DetectionBatch,
        profile: &CalibrationProfile,
        preferred_distance_cm: u32,
    ) -> Self {
        let distance_cm = estimate(batch.first(), profile).map(round_for_display);
        let eye_status = EyeStatus::from_batch(batch);
        let distance_ok = distance_cm
            .map(|d| d >= f64::from(preferred_distance_cm))
            .unwrap_or(false);

        Self {
            eye,
            distance_cm,
            eye_status,
            distance_ok,
            eye_isolated: eye_status.isolates(eye),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.distance_ok && self.eye_isolated
    }

    pub fn describe_gap(&self) -> String {
        match (self.distance_cm, self.distance_ok, self.eye_isolated) {
            (None, _, _) => "distance unavailable".to_string(),
            (Some(d), false, _) => format!("distance {d:.2} cm is closer than preferred"),
            (_, _, false) => format!("only the {} eye should be visible", self.eye.as_str()),
            _ => "ready".to_string(),
        }
    }
}
