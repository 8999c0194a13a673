use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::models::Direction;
use crate::settings::StimulusSettings;

pub const TRIALS_PER_EYE: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StimulusTrial {
    pub direction: Direction,
    pub size_px: u32,
}

/// Stateless generator for one eye's stimuli. Run progress lives in `EyeRun`.
#[derive(Debug, Clone)]
pub struct StimulusSequencer {
    initial_size_px: u32,
    step_px: u32,
    floor_px: u32,
}

impl StimulusSequencer {
    pub fn new(settings: &StimulusSettings) -> Self {
        Self {
            initial_size_px: settings.initial_size_px,
            step_px: settings.step_px,
            floor_px: settings.floor_px,
        }
    }

    pub fn initial_size(&self) -> u32 {
        self.initial_size_px
    }

    pub fn next_size(&self, previous_size: u32) -> u32 {
        previous_size
            .saturating_sub(self.step_px)
            .max(self.floor_px)
    }

    /// Ten directions drawn uniformly with replacement, sized from the initial size down.
    pub fn generate_trials(&self, rng: &mut dyn RngCore) -> Vec<StimulusTrial> {
        let mut size = self.initial_size_px;
        let mut trials = Vec::with_capacity(TRIALS_PER_EYE);
        for index in 0..TRIALS_PER_EYE {
            if index > 0 {
                size = self.next_size(size);
            }
            let direction = *Direction::ALL
                .choose(rng)
                .unwrap_or(&Direction::Up);
            trials.push(StimulusTrial {
                direction,
                size_px: size,
            });
        }
        trials
    }
}

impl Default for StimulusSequencer {
    fn default() -> Self {
        Self::new(&StimulusSettings::default())
    }
}
