use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;

use super::classifier::{ClassificationRequest, ClassificationResponse};
use super::run::{AnswerOutcome, EyeRun};
use super::state::{SessionEvent, SessionState, Transition};
use super::stimulus::{StimulusSequencer, StimulusTrial};
use crate::error::EngineError;
use crate::models::{
    AcuityOutcome, DetectionBatch, Direction, Eye, SubjectDraft, SubjectMetadata, SubjectRules,
};
use crate::settings::{CalibrationSettings, EngineSettings};
use crate::vision::{GatePolicy, Readiness};

/// Point-in-time view of a session for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub state: SessionState,
    pub current_trial: Option<StimulusTrial>,
    pub trial_index: Option<usize>,
    pub left_score: Option<u8>,
    pub right_score: Option<u8>,
    pub classification_in_flight: bool,
}

/// Two-eye tumbling-E session: setup, calibration, trials, and hand-off to the classifier.
///
/// Runs are stored per eye; the subject chooses which eye goes first.
pub struct AcuitySessionEngine {
    state: SessionState,
    subject: Option<SubjectMetadata>,
    right: Option<EyeRun>,
    left: Option<EyeRun>,
    sequencer: StimulusSequencer,
    calibration: CalibrationSettings,
    rules: SubjectRules,
    rng: Box<dyn RngCore + Send>,
    pending: Option<ClassificationRequest>,
}

impl AcuitySessionEngine {
    pub fn new(settings: &EngineSettings) -> Self {
        Self::with_rng(settings, Box::new(StdRng::from_entropy()))
    }

    /// Engine drawing trials from `rng`; tests pass a seeded generator.
    pub fn with_rng(settings: &EngineSettings, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            state: SessionState::Setup,
            subject: None,
            right: None,
            left: None,
            sequencer: StimulusSequencer::new(&settings.stimulus),
            calibration: settings.calibration.clone(),
            rules: settings.subject.clone(),
            rng,
            pending: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn subject(&self) -> Option<&SubjectMetadata> {
        self.subject.as_ref()
    }

    pub fn run(&self, eye: Eye) -> Option<&EyeRun> {
        match eye {
            Eye::Left => self.left.as_ref(),
            Eye::Right => self.right.as_ref(),
        }
    }

    pub fn classification_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    pub fn current_trial(&self) -> Option<&StimulusTrial> {
        match self.state {
            SessionState::Testing { eye } => self.run(eye).and_then(EyeRun::current_trial),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let trial_index = match self.state {
            SessionState::Testing { eye } => self.run(eye).map(|run| run.current_index),
            _ => None,
        };
        EngineSnapshot {
            state: self.state,
            current_trial: self.current_trial().copied(),
            trial_index,
            left_score: self.left.as_ref().and_then(|run| run.score),
            right_score: self.right.as_ref().and_then(|run| run.score),
            classification_in_flight: self.classification_in_flight(),
        }
    }

    /// Readiness of the eye being calibrated against the given detections.
    pub fn calibration_readiness(&self, detections: &DetectionBatch) -> Result<Readiness, EngineError> {
        match self.state {
            SessionState::Calibrating { eye } | SessionState::Testing { eye } => {
                self.readiness_for(eye, detections)
            }
            state => Err(EngineError::InvalidTransition {
                action: "check calibration",
                state: state.name(),
            }),
        }
    }

    pub fn apply(&mut self, event: SessionEvent) -> Result<Transition, EngineError> {
        let action = event.name();
        match (self.state, event) {
            (SessionState::Setup, SessionEvent::SubmitSubject(draft)) => {
                let subject = draft.validate(&self.rules).map_err(|err| {
                    warn!("session setup rejected: {err}");
                    err
                })?;
                info!(
                    "session setup accepted: age {}, glasses {}, preferred distance {} cm",
                    subject.age,
                    subject.wears_glasses.as_str(),
                    subject.preferred_distance_cm
                );
                self.subject = Some(subject);
                self.enter(SessionState::EyeSelect);
                Ok(Transition::SubjectAccepted)
            }

            (SessionState::EyeSelect, SessionEvent::SelectEye(eye)) => {
                self.begin_run(eye);
                Ok(Transition::Calibrating { eye })
            }

            (SessionState::Calibrating { eye }, SessionEvent::StartTesting { detections, force }) => {
                let readiness = self.readiness_for(eye, &detections)?;
                if !readiness.is_ready() {
                    if self.calibration.gate_policy == GatePolicy::Enforced && !force {
                        return Err(EngineError::SensingUnavailable(readiness.describe_gap()));
                    }
                    warn!(
                        "starting {} eye test before calibration is ready ({})",
                        eye.as_str(),
                        readiness.describe_gap()
                    );
                }
                self.enter(SessionState::Testing { eye });
                Ok(Transition::Testing { eye, readiness })
            }

            (SessionState::Testing { eye }, SessionEvent::Answer(direction)) => {
                let run = self.run_mut(eye).ok_or_else(|| {
                    EngineError::InconsistentAnswerState(format!("no run for {} eye", eye.as_str()))
                })?;
                match run.record(direction) {
                    AnswerOutcome::Recorded { next_index } => {
                        Ok(Transition::AnswerRecorded { eye, next_index })
                    }
                    AnswerOutcome::Sealed { score } => {
                        info!("{} eye sealed with score {score}/10", eye.as_str());
                        self.enter(SessionState::EyeComplete { eye });
                        Ok(Transition::EyeSealed { eye, score })
                    }
                    AnswerOutcome::Ignored => Ok(Transition::AnswerIgnored),
                }
            }
            (
                SessionState::EyeComplete { .. }
                | SessionState::BothComplete
                | SessionState::Classified(_)
                | SessionState::Aborted,
                SessionEvent::Answer(direction),
            ) => {
                debug!("ignoring late answer {}", direction.as_str());
                Ok(Transition::AnswerIgnored)
            }
            (state, SessionEvent::Answer(_)) => Err(EngineError::InconsistentAnswerState(format!(
                "no trial is shown while session is {}",
                state.name()
            ))),

            (SessionState::EyeComplete { eye }, SessionEvent::Advance) => {
                let other = eye.other();
                if self.run(other).is_none() {
                    self.begin_run(other);
                    return Ok(Transition::Calibrating { eye: other });
                }
                let (left_score, right_score) = self.sealed_scores()?;
                self.enter(SessionState::BothComplete);
                Ok(Transition::BothComplete {
                    left_score,
                    right_score,
                })
            }

            (SessionState::EyeSelect, SessionEvent::Back) => {
                self.subject = None;
                self.enter(SessionState::Setup);
                Ok(Transition::SteppedBack(SessionState::Setup))
            }
            (SessionState::Calibrating { eye }, SessionEvent::Back)
                if self.run(eye.other()).is_none() =>
            {
                self.set_run(eye, None);
                self.enter(SessionState::EyeSelect);
                Ok(Transition::SteppedBack(SessionState::EyeSelect))
            }
            (SessionState::Testing { eye }, SessionEvent::Back) => {
                self.begin_run(eye);
                Ok(Transition::SteppedBack(self.state))
            }

            (SessionState::BothComplete, SessionEvent::RequestClassification) => {
                if self.pending.is_some() {
                    return Err(EngineError::ClassificationInFlight);
                }
                let (left_score, right_score) = self.sealed_scores()?;
                let subject = self.subject.as_ref().ok_or_else(|| {
                    EngineError::Validation("session has no subject data".to_string())
                })?;
                let request = ClassificationRequest::new(subject, left_score, right_score);
                self.pending = Some(request.clone());
                info!("classification requested (left {left_score}, right {right_score})");
                Ok(Transition::ClassificationRequested(request))
            }
            (SessionState::BothComplete, SessionEvent::ClassificationFinished(result)) => {
                let request = self.pending.take().ok_or(EngineError::InvalidTransition {
                    action,
                    state: "BothComplete without a pending request",
                })?;
                let outcome = result
                    .and_then(|response| response.into_outcome(&request))
                    .map_err(|err| {
                        warn!("classification failed; session stays BothComplete: {err}");
                        err
                    })?;
                info!(
                    "classified: left {}, right {}, tier {}",
                    outcome.left_pass,
                    outcome.right_pass,
                    outcome.tier.as_str()
                );
                self.enter(SessionState::Classified(outcome));
                Ok(Transition::Classified(outcome))
            }

            (SessionState::Aborted, SessionEvent::Abort) => Ok(Transition::Aborted),
            (_, SessionEvent::Abort) => {
                self.subject = None;
                self.right = None;
                self.left = None;
                self.pending = None;
                self.enter(SessionState::Aborted);
                Ok(Transition::Aborted)
            }

            (state, _) => Err(EngineError::InvalidTransition {
                action,
                state: state.name(),
            }),
        }
    }

    pub fn submit_subject(&mut self, draft: SubjectDraft) -> Result<Transition, EngineError> {
        self.apply(SessionEvent::SubmitSubject(draft))
    }

    pub fn select_eye(&mut self, eye: Eye) -> Result<Transition, EngineError> {
        self.apply(SessionEvent::SelectEye(eye))
    }

    pub fn start_testing(
        &mut self,
        detections: DetectionBatch,
        force: bool,
    ) -> Result<Transition, EngineError> {
        self.apply(SessionEvent::StartTesting { detections, force })
    }

    pub fn submit_answer(&mut self, direction: Direction) -> Result<Transition, EngineError> {
        self.apply(SessionEvent::Answer(direction))
    }

    pub fn advance(&mut self) -> Result<Transition, EngineError> {
        self.apply(SessionEvent::Advance)
    }

    pub fn back(&mut self) -> Result<Transition, EngineError> {
        self.apply(SessionEvent::Back)
    }

    pub fn begin_classification(&mut self) -> Result<ClassificationRequest, EngineError> {
        match self.apply(SessionEvent::RequestClassification)? {
            Transition::ClassificationRequested(request) => Ok(request),
            _ => Err(EngineError::InvalidTransition {
                action: "request classification",
                state: self.state.name(),
            }),
        }
    }

    pub fn finish_classification(
        &mut self,
        result: Result<ClassificationResponse, EngineError>,
    ) -> Result<AcuityOutcome, EngineError> {
        match self.apply(SessionEvent::ClassificationFinished(result))? {
            Transition::Classified(outcome) => Ok(outcome),
            _ => Err(EngineError::InvalidTransition {
                action: "finish classification",
                state: self.state.name(),
            }),
        }
    }

    pub fn abort(&mut self) {
        let _ = self.apply(SessionEvent::Abort);
    }

    fn enter(&mut self, next: SessionState) {
        debug!("acuity session {} -> {}", self.state.name(), next.name());
        self.state = next;
    }

    /// Fresh trials at the initial size, then calibration for `eye`.
    fn begin_run(&mut self, eye: Eye) {
        let trials = self.sequencer.generate_trials(&mut *self.rng);
        self.set_run(eye, Some(EyeRun::new(eye, trials)));
        self.enter(SessionState::Calibrating { eye });
    }

    fn readiness_for(&self, eye: Eye, detections: &DetectionBatch) -> Result<Readiness, EngineError> {
        let subject = self.subject.as_ref().ok_or_else(|| {
            EngineError::Validation("session has no subject data".to_string())
        })?;
        Ok(Readiness::evaluate(
            eye,
            detections,
            self.calibration.profile(eye),
            subject.preferred_distance_cm,
        ))
    }

    fn run_mut(&mut self, eye: Eye) -> Option<&mut EyeRun> {
        match eye {
            Eye::Left => self.left.as_mut(),
            Eye::Right => self.right.as_mut(),
        }
    }

    fn set_run(&mut self, eye: Eye, run: Option<EyeRun>) {
        match eye {
            Eye::Left => self.left = run,
            Eye::Right => self.right = run,
        }
    }

    fn sealed_scores(&self) -> Result<(u8, u8), EngineError> {
        match (
            self.left.as_ref().and_then(|run| run.score),
            self.right.as_ref().and_then(|run| run.score),
        ) {
            (Some(left), Some(right)) => Ok((left, right)),
            _ => Err(EngineError::InconsistentAnswerState(
                "both eyes must be sealed".to_string(),
            )),
        }
    }
}
