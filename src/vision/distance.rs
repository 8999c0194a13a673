use serde::{Deserialize, Serialize};

use crate::models::{Detection, Eye};

/// Per-eye constants relating a reference object's pixel width to a known distance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationProfile {
    pub eye: Eye,
    pub reference_width_px: f64,
    pub known_distance_cm: f64,
}

impl CalibrationProfile {
    pub fn left_default() -> Self {
        Self {
            eye: Eye::Left,
            reference_width_px: 50.0,
            known_distance_cm: 15.0,
        }
    }

    pub fn right_default() -> Self {
        Self {
            eye: Eye::Right,
            reference_width_px: 65.0,
            known_distance_cm: 15.0,
        }
    }
}

/// Estimated subject-to-camera distance in centimetres.
///
/// `None` when there is no detection or the box has no usable width.
pub fn estimate(detection: Option<&Detection>, profile: &CalibrationProfile) -> Option<f64> {
    let width = detection?.box_width();
    if !width.is_finite() || width <= 0.0 {
        return None;
    }
    Some(profile.reference_width_px / width * profile.known_distance_cm)
}

pub fn round_for_display(distance_cm: f64) -> f64 {
    (distance_cm * 100.0).round() / 100.0
}
