use serde::{Deserialize, Serialize};

use super::stimulus::{StimulusTrial, TRIALS_PER_EYE};
use crate::models::{Direction, Eye};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Answer stored; `next_index` is the trial now shown.
    Recorded { next_index: usize },
    /// The tenth answer sealed the run.
    Sealed { score: u8 },
    /// The run was already sealed.
    Ignored,
}

/// Progress of one eye's tumbling-E run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EyeRun {
    pub eye: Eye,
    pub trials: Vec<StimulusTrial>,
    pub current_index: usize,
    pub answers: Vec<Direction>,
    pub score: Option<u8>,
}

impl EyeRun {
    pub fn new(eye: Eye, trials: Vec<StimulusTrial>) -> Self {
        debug_assert_eq!(trials.len(), TRIALS_PER_EYE);
        Self {
            eye,
            trials,
            current_index: 0,
            answers: Vec::with_capacity(TRIALS_PER_EYE),
            score: None,
        }
    }

    pub fn current_trial(&self) -> Option<&StimulusTrial> {
        if self.is_sealed() {
            return None;
        }
        self.trials.get(self.current_index)
    }

    pub fn is_sealed(&self) -> bool {
        self.score.is_some()
    }

    pub fn record(&mut self, answer: Direction) -> AnswerOutcome {
        if self.is_sealed() || self.current_index >= self.trials.len() {
            return AnswerOutcome::Ignored;
        }

        self.answers.push(answer);
        self.current_index += 1;

        if self.current_index == self.trials.len() {
            let score = score_answers(&self.trials, &self.answers);
            self.score = Some(score);
            AnswerOutcome::Sealed { score }
        } else {
            AnswerOutcome::Recorded {
                next_index: self.current_index,
            }
        }
    }
}

fn score_answers(trials: &[StimulusTrial], answers: &[Direction]) -> u8 {
    let correct = trials
        .iter()
        .zip(answers)
        .filter(|(trial, answer)| trial.direction == **answer)
        .count();
    u8::try_from(correct).unwrap_or(u8::MAX)
}
