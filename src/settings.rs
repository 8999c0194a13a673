use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::models::{Eye, SubjectRules};
use crate::vision::{CalibrationProfile, GatePolicy, PollSettings};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StimulusSettings {
    pub initial_size_px: u32,
    pub step_px: u32,
    pub floor_px: u32,
}

impl Default for StimulusSettings {
    fn default() -> Self {
        Self {
            initial_size_px: 40,
            step_px: 5,
            floor_px: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CalibrationSettings {
    #[serde(deserialize_with = "left_profile")]
    pub left: CalibrationProfile,
    #[serde(deserialize_with = "right_profile")]
    pub right: CalibrationProfile,
    pub gate_policy: GatePolicy,
}

/// Profile as written in the settings file; missing keys keep the slot's default.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileOverride {
    eye: Option<Eye>,
    reference_width_px: Option<f64>,
    known_distance_cm: Option<f64>,
}

impl ProfileOverride {
    fn apply(self, base: CalibrationProfile) -> CalibrationProfile {
        CalibrationProfile {
            eye: self.eye.unwrap_or(base.eye),
            reference_width_px: self.reference_width_px.unwrap_or(base.reference_width_px),
            known_distance_cm: self.known_distance_cm.unwrap_or(base.known_distance_cm),
        }
    }
}

fn left_profile<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CalibrationProfile, D::Error> {
    ProfileOverride::deserialize(deserializer).map(|o| o.apply(CalibrationProfile::left_default()))
}

fn right_profile<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<CalibrationProfile, D::Error> {
    ProfileOverride::deserialize(deserializer).map(|o| o.apply(CalibrationProfile::right_default()))
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            left: CalibrationProfile::left_default(),
            right: CalibrationProfile::right_default(),
            gate_policy: GatePolicy::Soft,
        }
    }
}

impl CalibrationSettings {
    pub fn profile(&self, eye: Eye) -> &CalibrationProfile {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub stimulus: StimulusSettings,
    pub calibration: CalibrationSettings,
    pub subject: SubjectRules,
    pub classifier_timeout_ms: u64,
    pub detection_poll_interval_ms: u64,
    pub detection_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stimulus: StimulusSettings::default(),
            calibration: CalibrationSettings::default(),
            subject: SubjectRules::default(),
            classifier_timeout_ms: 5_000,
            detection_poll_interval_ms: 1_000,
            detection_timeout_ms: 5_000,
        }
    }
}

impl EngineSettings {
    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier_timeout_ms)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.detection_poll_interval_ms),
            timeout: Duration::from_millis(self.detection_timeout_ms),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let stimulus = &self.stimulus;
        if stimulus.floor_px == 0 || stimulus.step_px == 0 {
            bail!("stimulus step and floor must be greater than zero");
        }
        if stimulus.initial_size_px < stimulus.floor_px {
            bail!(
                "initial stimulus size {} is below the floor {}",
                stimulus.initial_size_px,
                stimulus.floor_px
            );
        }

        for (slot, profile) in [
            (Eye::Left, &self.calibration.left),
            (Eye::Right, &self.calibration.right),
        ] {
            if profile.eye != slot {
                bail!("{} calibration profile is tagged {:?}", slot.as_str(), profile.eye);
            }
            if !(profile.reference_width_px > 0.0 && profile.known_distance_cm > 0.0) {
                bail!("{} calibration constants must be positive", slot.as_str());
            }
        }

        if self.subject.min_age > self.subject.max_age {
            bail!("subject minAge exceeds maxAge");
        }
        if self.subject.preferred_distances_cm.is_empty() {
            bail!("at least one preferred distance must be offered");
        }
        if self.classifier_timeout_ms == 0
            || self.detection_poll_interval_ms == 0
            || self.detection_timeout_ms == 0
        {
            bail!("timeouts and poll interval must be greater than zero");
        }
        Ok(())
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<EngineSettings>(&contents)
                .map_err(anyhow::Error::from)
                .and_then(|settings| settings.validate().map(|_| settings))
            {
                Ok(settings) => settings,
                Err(err) => {
                    warn!(
                        "Ignoring invalid settings at {} ({err}); using defaults",
                        path.display()
                    );
                    EngineSettings::default()
                }
            }
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> EngineSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: EngineSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: EngineSettings = serde_json::from_str(&contents)?;
        data.validate()?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
