use log::info;
use serde::{Deserialize, Serialize};

use super::verdict::{evaluate, AstigmatismAnswers, AstigmatismVerdict};
use crate::error::EngineError;
use crate::models::YesNo;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Question {
    LeftEyeClarity,
    RightEyeClarity,
    Glare,
    Headache,
}

/// Finished questionnaire: every answer resolved and the verdict fixed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AstigmatismOutcome {
    pub left_eye_clear: YesNo,
    pub right_eye_clear: YesNo,
    pub glare: YesNo,
    pub headache: YesNo,
    pub verdict: AstigmatismVerdict,
}

impl AstigmatismOutcome {
    pub fn schedule_follow_up(&self) -> bool {
        self.verdict.schedule_follow_up()
    }
}

/// Left eye first, then right eye, then glare and headache when either eye saw uneven lines.
#[derive(Debug, Clone, Default)]
pub struct AstigmatismQuestionnaire {
    answers: AstigmatismAnswers,
    verdict: Option<AstigmatismVerdict>,
}

impl AstigmatismQuestionnaire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answers(&self) -> &AstigmatismAnswers {
        &self.answers
    }

    pub fn verdict(&self) -> Option<AstigmatismVerdict> {
        self.verdict
    }

    pub fn next_question(&self) -> Option<Question> {
        if self.verdict.is_some() {
            return None;
        }
        let a = &self.answers;
        if a.left_eye_clear.is_none() {
            Some(Question::LeftEyeClarity)
        } else if a.right_eye_clear.is_none() {
            Some(Question::RightEyeClarity)
        } else if a.glare.is_none() {
            Some(Question::Glare)
        } else if a.headache.is_none() {
            Some(Question::Headache)
        } else {
            None
        }
    }

    /// Record one answer. Returns the verdict once the answer set is complete.
    pub fn answer(
        &mut self,
        question: Question,
        answer: YesNo,
    ) -> Result<Option<AstigmatismVerdict>, EngineError> {
        if self.verdict.is_some() {
            return Err(inconsistent("questionnaire is already complete"));
        }

        let a = &mut self.answers;
        match question {
            Question::LeftEyeClarity => fill(&mut a.left_eye_clear, answer, "left eye")?,
            Question::RightEyeClarity => {
                if a.left_eye_clear.is_none() {
                    return Err(inconsistent("left eye is asked before right eye"));
                }
                fill(&mut a.right_eye_clear, answer, "right eye")?;
                if a.needs_follow_up() == Some(false) {
                    a.glare = Some(YesNo::No);
                    a.headache = Some(YesNo::No);
                }
            }
            Question::Glare | Question::Headache => {
                if a.needs_follow_up().is_none() {
                    return Err(inconsistent("follow-up asked before both eyes were answered"));
                }
                match question {
                    Question::Glare => fill(&mut a.glare, answer, "glare")?,
                    _ => fill(&mut a.headache, answer, "headache")?,
                }
            }
        }

        self.verdict = evaluate(&self.answers);
        if let Some(verdict) = self.verdict {
            info!(
                "astigmatism verdict: {} (follow-up: {})",
                verdict.message(),
                verdict.schedule_follow_up()
            );
        }
        Ok(self.verdict)
    }

    pub fn outcome(&self) -> Option<AstigmatismOutcome> {
        let verdict = self.verdict?;
        let a = &self.answers;
        Some(AstigmatismOutcome {
            left_eye_clear: a.left_eye_clear?,
            right_eye_clear: a.right_eye_clear?,
            glare: a.glare?,
            headache: a.headache?,
            verdict,
        })
    }
}

fn fill(slot: &mut Option<YesNo>, answer: YesNo, what: &str) -> Result<(), EngineError> {
    if slot.is_some() {
        return Err(inconsistent(&format!("{what} was already answered")));
    }
    *slot = Some(answer);
    Ok(())
}

fn inconsistent(message: &str) -> EngineError {
    EngineError::InconsistentAnswerState(message.to_string())
}
