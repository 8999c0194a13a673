//! Detections produced by the external eye detector, one batch per camera frame.

use serde::{Deserialize, Serialize};

use super::Eye;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DetectionLabel {
    LeftEye,
    RightEye,
}

impl DetectionLabel {
    pub fn eye(self) -> Eye {
        match self {
            DetectionLabel::LeftEye => Eye::Left,
            DetectionLabel::RightEye => Eye::Right,
        }
    }
}

/// A single labelled bounding box `[x0, y0, x1, y1]` in pixels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    #[serde(alias = "object")]
    pub label: DetectionLabel,
    #[serde(alias = "box")]
    pub bounding_box: [f64; 4],
}

impl Detection {
    pub fn new(label: DetectionLabel, bounding_box: [f64; 4]) -> Self {
        Self {
            label,
            bounding_box,
        }
    }

    pub fn box_width(&self) -> f64 {
        self.bounding_box[2] - self.bounding_box[0]
    }
}

/// Everything the detector reported for one frame, in detector order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectionBatch {
    pub detections: Vec<Detection>,
}

impl DetectionBatch {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// First detection as produced upstream; no re-ranking.
    pub fn first(&self) -> Option<&Detection> {
        self.detections.first()
    }

    pub fn contains(&self, eye: Eye) -> bool {
        self.detections.iter().any(|d| d.label.eye() == eye)
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Summary of which eyes the detector currently sees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EyeStatus {
    BothDetected,
    OnlyLeft,
    OnlyRight,
    None,
}

impl EyeStatus {
    pub fn from_batch(batch: &DetectionBatch) -> Self {
        match (batch.contains(Eye::Left), batch.contains(Eye::Right)) {
            (true, true) => EyeStatus::BothDetected,
            (true, false) => EyeStatus::OnlyLeft,
            (false, true) => EyeStatus::OnlyRight,
            (false, false) => EyeStatus::None,
        }
    }

    /// True when exactly `eye` is visible and the other one is covered.
    pub fn isolates(self, eye: Eye) -> bool {
        matches!(
            (self, eye),
            (EyeStatus::OnlyLeft, Eye::Left) | (EyeStatus::OnlyRight, Eye::Right)
        )
    }
}
