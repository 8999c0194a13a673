//! Payloads exchanged with the remote scoring service.
//!
//! Transport is left to the `Classifier` implementation; only the payload shapes and the
//! `1 = pass` mapping are fixed here.

use std::future::Future;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::{AcuityOutcome, SubjectMetadata, YesNo};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationRequest {
    pub age: u32,
    pub eyeglasses: YesNo,
    pub hobby: String,
    pub preferred_distance: u32,
    pub left_eye_score: u8,
    pub right_eye_score: u8,
}

impl ClassificationRequest {
    pub fn new(subject: &SubjectMetadata, left_eye_score: u8, right_eye_score: u8) -> Self {
        Self {
            age: subject.age,
            eyeglasses: subject.wears_glasses,
            hobby: subject.hobby.clone(),
            preferred_distance: subject.preferred_distance_cm,
            left_eye_score,
            right_eye_score,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationResponse {
    pub left_eye_prediction: u8,
    pub right_eye_prediction: u8,
}

impl ClassificationResponse {
    pub fn new(left_pass: bool, right_pass: bool) -> Self {
        Self {
            left_eye_prediction: u8::from(left_pass),
            right_eye_prediction: u8::from(right_pass),
        }
    }

    /// Map predictions onto the request's scores. Anything but 0/1 is rejected.
    pub fn into_outcome(self, request: &ClassificationRequest) -> Result<AcuityOutcome, EngineError> {
        let left_pass = prediction_to_pass(self.left_eye_prediction, "left")?;
        let right_pass = prediction_to_pass(self.right_eye_prediction, "right")?;
        Ok(AcuityOutcome::new(
            request.left_eye_score,
            request.right_eye_score,
            left_pass,
            right_pass,
        ))
    }
}

fn prediction_to_pass(prediction: u8, eye: &str) -> Result<bool, EngineError> {
    match prediction {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(EngineError::ClassificationFailure(format!(
            "unexpected {eye} eye prediction {other}"
        ))),
    }
}

/// Remote pass/fail scoring service.
pub trait Classifier: Send + Sync + 'static {
    fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> impl Future<Output = Result<ClassificationResponse>> + Send;
}
