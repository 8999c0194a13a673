use serde::{Deserialize, Serialize};

use super::YesNo;
use crate::error::EngineError;

/// Limits applied to the setup form before a session may start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectRules {
    pub min_age: u32,
    pub max_age: u32,
    pub preferred_distances_cm: Vec<u32>,
}

impl Default for SubjectRules {
    fn default() -> Self {
        Self {
            min_age: 9,
            max_age: 89,
            preferred_distances_cm: vec![30, 40],
        }
    }
}

/// Setup form as entered; any field may still be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDraft {
    pub age: Option<i32>,
    pub wears_glasses: Option<YesNo>,
    pub hobby: Option<String>,
    pub preferred_distance_cm: Option<u32>,
}

/// Validated subject data, fixed for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectMetadata {
    pub age: u32,
    pub wears_glasses: YesNo,
    pub hobby: String,
    pub preferred_distance_cm: u32,
}

impl SubjectDraft {
    pub fn validate(self, rules: &SubjectRules) -> Result<SubjectMetadata, EngineError> {
        let hobby = self
            .hobby
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());

        let (Some(age), Some(wears_glasses), Some(hobby), Some(preferred_distance_cm)) =
            (self.age, self.wears_glasses, hobby, self.preferred_distance_cm)
        else {
            return Err(EngineError::Validation(
                "please fill in all fields".to_string(),
            ));
        };

        let age = u32::try_from(age)
            .ok()
            .filter(|age| (rules.min_age..=rules.max_age).contains(age))
            .ok_or_else(|| {
                EngineError::Validation(format!(
                    "age is not valid: expected {}-{}, got {age}",
                    rules.min_age, rules.max_age
                ))
            })?;

        if !rules.preferred_distances_cm.contains(&preferred_distance_cm) {
            return Err(EngineError::Validation(format!(
                "preferred distance {preferred_distance_cm} cm is not one of {:?}",
                rules.preferred_distances_cm
            )));
        }

        Ok(SubjectMetadata {
            age,
            wears_glasses,
            hobby,
            preferred_distance_cm,
        })
    }
}
