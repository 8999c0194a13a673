use serde::{Deserialize, Serialize};

use super::classifier::{ClassificationRequest, ClassificationResponse};
use crate::error::EngineError;
use crate::models::{AcuityOutcome, DetectionBatch, Direction, Eye, SubjectDraft};
use crate::vision::Readiness;

/// Current step of an acuity session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum SessionState {
    Setup,
    EyeSelect,
    Calibrating { eye: Eye },
    /// Trial progress is tracked by the eye's run.
    Testing { eye: Eye },
    EyeComplete { eye: Eye },
    BothComplete,
    Classified(AcuityOutcome),
    Aborted,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Setup => "Setup",
            SessionState::EyeSelect => "EyeSelect",
            SessionState::Calibrating { .. } => "Calibrating",
            SessionState::Testing { .. } => "Testing",
            SessionState::EyeComplete { .. } => "EyeComplete",
            SessionState::BothComplete => "BothComplete",
            SessionState::Classified(_) => "Classified",
            SessionState::Aborted => "Aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Classified(_) | SessionState::Aborted)
    }
}

/// Inputs to `AcuitySessionEngine::apply`.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    SubmitSubject(SubjectDraft),
    SelectEye(Eye),
    /// `force` bypasses an enforced calibration gate.
    StartTesting {
        detections: DetectionBatch,
        force: bool,
    },
    Answer(Direction),
    Advance,
    Back,
    RequestClassification,
    ClassificationFinished(Result<ClassificationResponse, EngineError>),
    Abort,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SubmitSubject(_) => "submit subject",
            SessionEvent::SelectEye(_) => "select eye",
            SessionEvent::StartTesting { .. } => "start testing",
            SessionEvent::Answer(_) => "submit answer",
            SessionEvent::Advance => "advance",
            SessionEvent::Back => "go back",
            SessionEvent::RequestClassification => "request classification",
            SessionEvent::ClassificationFinished(_) => "finish classification",
            SessionEvent::Abort => "abort",
        }
    }
}

/// What a successfully applied event did.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    SubjectAccepted,
    Calibrating { eye: Eye },
    Testing { eye: Eye, readiness: Readiness },
    AnswerRecorded { eye: Eye, next_index: usize },
    EyeSealed { eye: Eye, score: u8 },
    AnswerIgnored,
    BothComplete { left_score: u8, right_score: u8 },
    ClassificationRequested(ClassificationRequest),
    Classified(AcuityOutcome),
    SteppedBack(SessionState),
    Aborted,
}
