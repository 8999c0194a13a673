#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use eyecheck::acuity::{ClassificationRequest, ClassificationResponse, Classifier, Transition};
use eyecheck::models::{
    Detection, DetectionBatch, DetectionLabel, Direction, EyeStatus, ResultRecord, StoredResult,
    SubjectDraft, YesNo,
};
use eyecheck::{Database, EngineSettings, ResultStore, ScreeningController, VisionSource};
use tempfile::TempDir;

pub enum Step {
    Respond(ClassificationResponse),
    Delay(Duration, ClassificationResponse),
    Fail(&'static str),
}

#[derive(Default)]
struct ClassifierScript {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ClassificationRequest>>,
}

/// Classifier that replays queued steps and records every request.
#[derive(Clone, Default)]
pub struct ScriptedClassifier {
    script: Arc<ClassifierScript>,
}

impl ScriptedClassifier {
    pub fn new(steps: Vec<Step>) -> Self {
        let classifier = Self::default();
        classifier.script.steps.lock().unwrap().extend(steps);
        classifier
    }

    pub fn requests(&self) -> Vec<ClassificationRequest> {
        self.script.requests.lock().unwrap().clone()
    }
}

impl Classifier for ScriptedClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<ClassificationResponse> {
        self.script.requests.lock().unwrap().push(request.clone());
        let step = self.script.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Delay(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(Step::Fail(message)) => bail!("{message}"),
            None => bail!("no scripted classifier response left"),
        }
    }
}

/// Detector that always reports the same frame.
pub struct StaticSource(pub DetectionBatch);

impl VisionSource for StaticSource {
    async fn detect(&self) -> Result<DetectionBatch> {
        Ok(self.0.clone())
    }
}

/// Right-eye detector that counts how often it was polled.
#[derive(Clone, Default)]
pub struct CountingSource {
    polls: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn calls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl VisionSource for CountingSource {
    async fn detect(&self) -> Result<DetectionBatch> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(right_eye_frame())
    }
}

/// Database wrapper whose next save can be made to fail.
pub struct FlakyStore {
    pub db: Database,
    pub fail_next_save: AtomicBool,
}

impl ResultStore for FlakyStore {
    async fn save_result(&self, user_id: &str, record: &ResultRecord) -> Result<String> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            bail!("disk full");
        }
        self.db.save_result(user_id, record).await
    }

    async fn list_results(&self, user_id: &str) -> Result<Vec<StoredResult>> {
        self.db.list_results(user_id).await
    }

    async fn list_results_paginated(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<StoredResult>> {
        self.db.list_results_paginated(user_id, limit, offset).await
    }

    async fn get_result(&self, id: &str) -> Result<Option<StoredResult>> {
        self.db.get_result(id).await
    }
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        detection_poll_interval_ms: 10,
        detection_timeout_ms: 100,
        ..EngineSettings::default()
    }
}

pub fn open_database() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("eyecheck.sqlite3")).unwrap();
    (dir, db)
}

pub fn subject() -> SubjectDraft {
    SubjectDraft {
        age: Some(25),
        wears_glasses: Some(YesNo::No),
        hobby: Some("Reading".to_string()),
        preferred_distance_cm: Some(30),
    }
}

/// Right eye only, 26 px wide: 37.5 cm with the default right profile.
pub fn right_eye_frame() -> DetectionBatch {
    DetectionBatch::new(vec![Detection::new(
        DetectionLabel::RightEye,
        [100.0, 80.0, 126.0, 100.0],
    )])
}

pub async fn wait_for_status<C: Classifier, S: ResultStore>(
    controller: &ScreeningController<C, S>,
    expected: EyeStatus,
) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if controller.eye_status().await.unwrap() == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("eye status never reached expected value");
}

/// Answer every trial of the eye under test, correctly or not. Returns the sealing transition.
pub async fn answer_all<C: Classifier, S: ResultStore>(
    controller: &ScreeningController<C, S>,
    correct: bool,
) -> Transition {
    loop {
        let snapshot = controller.snapshot().await.unwrap();
        let shown = snapshot.engine.current_trial.unwrap().direction;
        let direction = if correct {
            shown
        } else {
            Direction::ALL.into_iter().find(|d| *d != shown).unwrap()
        };
        let transition = controller.submit_answer(direction).await.unwrap();
        if matches!(transition, Transition::EyeSealed { .. }) {
            return transition;
        }
    }
}
