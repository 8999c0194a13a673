//! Acuity outcome and the durable result record handed to persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::YesNo;
use crate::astigmatism::AstigmatismVerdict;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PassFail {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

impl PassFail {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassFail::Pass => "PASS",
            PassFail::Fail => "FAIL",
        }
    }

    pub fn from_pass(pass: bool) -> Self {
        if pass {
            PassFail::Pass
        } else {
            PassFail::Fail
        }
    }
}

/// Overall risk tier derived from the per-eye classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Tier {
    Healthy,
    Mild,
    #[serde(rename = "At Risk")]
    AtRisk,
}

impl Tier {
    pub fn from_outcomes(left_pass: bool, right_pass: bool) -> Self {
        match (left_pass, right_pass) {
            (false, false) => Tier::AtRisk,
            (true, true) => Tier::Healthy,
            _ => Tier::Mild,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Healthy => "Healthy",
            Tier::Mild => "Mild",
            Tier::AtRisk => "At Risk",
        }
    }
}

/// Scores plus the classifier's verdict for both eyes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AcuityOutcome {
    pub left_score: u8,
    pub right_score: u8,
    pub left_pass: bool,
    pub right_pass: bool,
    pub tier: Tier,
}

impl AcuityOutcome {
    pub fn new(left_score: u8, right_score: u8, left_pass: bool, right_pass: bool) -> Self {
        Self {
            left_score,
            right_score,
            left_pass,
            right_pass,
            tier: Tier::from_outcomes(left_pass, right_pass),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub left_eye_score: u8,
    pub right_eye_score: u8,
    pub left_eye_result: PassFail,
    pub right_eye_result: PassFail,
    pub overall_result: Tier,
    pub left_eye_answer: YesNo,
    pub right_eye_answer: YesNo,
    pub glaring_answer: YesNo,
    pub headache_answer: YesNo,
    pub astigmatism_result: AstigmatismVerdict,
    pub schedule_follow_up: bool,
    pub created_at: DateTime<Utc>,
}

/// A record as read back from persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredResult {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub record: ResultRecord,
}
