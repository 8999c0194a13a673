use serde::{Deserialize, Serialize};

use crate::models::YesNo;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AstigmatismVerdict {
    #[serde(rename = "You don't have astigmatism")]
    Unlikely,
    #[serde(rename = "You MAY have astigmatism")]
    Possible,
}

impl AstigmatismVerdict {
    pub fn message(&self) -> &'static str {
        match self {
            AstigmatismVerdict::Unlikely => "You don't have astigmatism",
            AstigmatismVerdict::Possible => "You MAY have astigmatism",
        }
    }

    pub fn from_message(message: &str) -> Option<Self> {
        match message {
            "You don't have astigmatism" => Some(AstigmatismVerdict::Unlikely),
            "You MAY have astigmatism" => Some(AstigmatismVerdict::Possible),
            _ => None,
        }
    }

    /// A possible astigmatism should be followed up with an optometrist.
    pub fn schedule_follow_up(&self) -> bool {
        matches!(self, AstigmatismVerdict::Possible)
    }
}

/// Answers collected so far. Eye clarity is "do all lines look equally black?".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AstigmatismAnswers {
    pub left_eye_clear: Option<YesNo>,
    pub right_eye_clear: Option<YesNo>,
    pub glare: Option<YesNo>,
    pub headache: Option<YesNo>,
}

impl AstigmatismAnswers {
    /// `None` until both eyes are answered.
    pub fn needs_follow_up(&self) -> Option<bool> {
        match (self.left_eye_clear?, self.right_eye_clear?) {
            (YesNo::Yes, YesNo::Yes) => Some(false),
            _ => Some(true),
        }
    }
}

/// Verdict over a complete answer set; `None` while a required answer is missing.
///
/// Mixed eye answers are a possible astigmatism whatever the follow-ups say.
pub fn evaluate(answers: &AstigmatismAnswers) -> Option<AstigmatismVerdict> {
    let left = answers.left_eye_clear?;
    let right = answers.right_eye_clear?;
    match (left, right) {
        (YesNo::Yes, YesNo::Yes) => Some(AstigmatismVerdict::Unlikely),
        (YesNo::No, YesNo::No) => {
            let glare = answers.glare?;
            let headache = answers.headache?;
            if glare.is_yes() || headache.is_yes() {
                Some(AstigmatismVerdict::Possible)
            } else {
                Some(AstigmatismVerdict::Unlikely)
            }
        }
        _ => {
            answers.glare?;
            answers.headache?;
            Some(AstigmatismVerdict::Possible)
        }
    }
}
