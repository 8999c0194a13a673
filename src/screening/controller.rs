use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::acuity::{
    AcuitySessionEngine, ClassificationResponse, Classifier, EngineSnapshot, SessionState,
    Transition,
};
use crate::astigmatism::{AstigmatismQuestionnaire, AstigmatismVerdict, Question};
use crate::db::ResultStore;
use crate::error::EngineError;
use crate::models::{AcuityOutcome, Direction, Eye, EyeStatus, StoredResult, SubjectDraft, YesNo};
use crate::results;
use crate::settings::EngineSettings;
use crate::vision::{DetectionMailbox, DetectionPoller, Readiness, VisionSource};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningSnapshot {
    pub session_id: String,
    pub engine: EngineSnapshot,
    pub eye_status: EyeStatus,
    pub capturing: bool,
    pub next_question: Option<Question>,
    pub astigmatism_verdict: Option<AstigmatismVerdict>,
}

struct ActiveScreening {
    id: String,
    engine: AcuitySessionEngine,
    questionnaire: AstigmatismQuestionnaire,
    mailbox: DetectionMailbox,
    poller: DetectionPoller,
}

impl ActiveScreening {
    async fn shutdown(mut self) {
        self.engine.abort();
        if let Err(err) = self.poller.stop().await {
            warn!("screening {}: failed to stop detection loop: {err:#}", self.id);
        }
    }
}

/// One screening at a time: acuity test, astigmatism questions, then persistence.
pub struct ScreeningController<C: Classifier, S: ResultStore> {
    active: Arc<Mutex<Option<ActiveScreening>>>,
    classifier: Arc<C>,
    store: Arc<S>,
    settings: Arc<EngineSettings>,
}

impl<C: Classifier, S: ResultStore> Clone for ScreeningController<C, S> {
    fn clone(&self) -> Self {
        Self {
            active: Arc::clone(&self.active),
            classifier: Arc::clone(&self.classifier),
            store: Arc::clone(&self.store),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<C: Classifier, S: ResultStore> ScreeningController<C, S> {
    pub fn new(classifier: C, store: S, settings: EngineSettings) -> Self {
        Self {
            active: Arc::new(Mutex::new(None)),
            classifier: Arc::new(classifier),
            store: Arc::new(store),
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate the subject form and open a new screening. Returns the session id.
    pub async fn start_session(&self, draft: SubjectDraft) -> Result<String, EngineError> {
        let mut guard = self.active.lock().await;
        if let Some(existing) = guard.as_ref() {
            return Err(EngineError::InvalidTransition {
                action: "start session",
                state: existing.engine.state().name(),
            });
        }

        let mut engine = AcuitySessionEngine::new(&self.settings);
        engine.submit_subject(draft)?;

        let id = Uuid::new_v4().to_string();
        info!("screening {id} started");
        *guard = Some(ActiveScreening {
            id: id.clone(),
            engine,
            questionnaire: AstigmatismQuestionnaire::new(),
            mailbox: DetectionMailbox::new(),
            poller: DetectionPoller::new(),
        });
        Ok(id)
    }

    pub async fn select_eye(&self, eye: Eye) -> Result<Transition, EngineError> {
        self.with_session(|s| s.engine.select_eye(eye)).await
    }

    /// Start polling `source` into the session mailbox.
    pub async fn start_capture<V: VisionSource>(&self, source: V) -> Result<()> {
        let mut guard = self.active.lock().await;
        let session = guard.as_mut().ok_or(EngineError::NoActiveSession)?;
        session.poller.start(
            session.id.clone(),
            source,
            session.mailbox.clone(),
            self.settings.poll_settings(),
        )?;
        info!("screening {}: detection capture started", session.id);
        Ok(())
    }

    pub async fn stop_capture(&self) -> Result<()> {
        let mut guard = self.active.lock().await;
        let session = guard.as_mut().ok_or(EngineError::NoActiveSession)?;
        session.poller.stop().await
    }

    pub async fn calibration_readiness(&self) -> Result<Readiness, EngineError> {
        self.with_session(|s| s.engine.calibration_readiness(&s.mailbox.latest()))
            .await
    }

    pub async fn eye_status(&self) -> Result<EyeStatus, EngineError> {
        self.with_session(|s| Ok(EyeStatus::from_batch(&s.mailbox.latest())))
            .await
    }

    pub async fn start_test(&self, force: bool) -> Result<Transition, EngineError> {
        self.with_session(|s| s.engine.start_testing(s.mailbox.latest(), force))
            .await
    }

    pub async fn submit_answer(&self, direction: Direction) -> Result<Transition, EngineError> {
        self.with_session(|s| s.engine.submit_answer(direction)).await
    }

    pub async fn advance(&self) -> Result<Transition, EngineError> {
        let mut guard = self.active.lock().await;
        let session = guard.as_mut().ok_or(EngineError::NoActiveSession)?;
        let transition = session.engine.advance()?;
        match transition {
            Transition::Calibrating { .. } => session.mailbox.clear(),
            Transition::BothComplete { .. } => {
                if let Err(err) = session.poller.stop().await {
                    warn!("screening {}: failed to stop detection loop: {err:#}", session.id);
                }
            }
            _ => {}
        }
        Ok(transition)
    }

    pub async fn back(&self) -> Result<Transition, EngineError> {
        self.with_session(|s| s.engine.back()).await
    }

    /// Send both scores to the classifier.
    ///
    /// The call runs on its own task and always reports back to the session, so a caller
    /// that stops waiting never leaves a request pending. The session lock is not held
    /// while the classifier works.
    pub async fn classify(&self) -> Result<AcuityOutcome, EngineError> {
        let (session_id, request) = self
            .with_session(|s| Ok((s.id.clone(), s.engine.begin_classification()?)))
            .await?;

        let active = Arc::clone(&self.active);
        let classifier = Arc::clone(&self.classifier);
        let timeout = self.settings.classifier_timeout();
        let task_session_id = session_id.clone();
        let task = tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, classifier.classify(&request)).await
            {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(err)) => Err(EngineError::ClassificationFailure(format!("{err:#}"))),
                Err(_) => Err(EngineError::ClassificationTimeout(timeout)),
            };
            report_classification(&active, &task_session_id, result).await
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("screening {session_id}: classification task failed: {err}");
                let failure = EngineError::ClassificationFailure(format!("classifier task: {err}"));
                // Releases the pending request.
                let _ = report_classification(&self.active, &session_id, Err(failure.clone())).await;
                Err(failure)
            }
        }
    }

    pub async fn answer_astigmatism(
        &self,
        question: Question,
        answer: YesNo,
    ) -> Result<Option<AstigmatismVerdict>, EngineError> {
        self.with_session(|s| s.questionnaire.answer(question, answer))
            .await
    }

    /// Persist the finished screening for `user_id`. The session survives a failed save.
    pub async fn finish(&self, user_id: &str) -> Result<StoredResult> {
        let mut guard = self.active.lock().await;
        let session = guard.as_ref().ok_or(EngineError::NoActiveSession)?;

        let acuity = match session.engine.state() {
            SessionState::Classified(outcome) => outcome,
            state => {
                return Err(EngineError::InvalidTransition {
                    action: "finish",
                    state: state.name(),
                }
                .into())
            }
        };
        let astigmatism = session.questionnaire.outcome().ok_or_else(|| {
            EngineError::InconsistentAnswerState(
                "astigmatism questionnaire is incomplete".to_string(),
            )
        })?;

        let record = results::build(&acuity, &astigmatism);
        let id = self
            .store
            .save_result(user_id, &record)
            .await
            .context("failed to save screening result")?;

        if let Some(session) = guard.take() {
            info!("screening {} saved as result {id}", session.id);
            session.shutdown().await;
        }

        Ok(StoredResult {
            id,
            user_id: user_id.to_string(),
            record,
        })
    }

    /// Drop the current screening without persisting anything.
    pub async fn discard(&self) {
        let session = self.active.lock().await.take();
        if let Some(session) = session {
            info!("screening {} discarded", session.id);
            session.shutdown().await;
        }
    }

    pub async fn snapshot(&self) -> Option<ScreeningSnapshot> {
        let guard = self.active.lock().await;
        guard.as_ref().map(|s| ScreeningSnapshot {
            session_id: s.id.clone(),
            engine: s.engine.snapshot(),
            eye_status: EyeStatus::from_batch(&s.mailbox.latest()),
            capturing: s.poller.is_running(),
            next_question: s.questionnaire.next_question(),
            astigmatism_verdict: s.questionnaire.verdict(),
        })
    }

    async fn with_session<T>(
        &self,
        f: impl FnOnce(&mut ActiveScreening) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut guard = self.active.lock().await;
        let session = guard.as_mut().ok_or(EngineError::NoActiveSession)?;
        f(session)
    }
}

async fn report_classification(
    active: &Mutex<Option<ActiveScreening>>,
    session_id: &str,
    result: Result<ClassificationResponse, EngineError>,
) -> Result<AcuityOutcome, EngineError> {
    let mut guard = active.lock().await;
    let session = guard
        .as_mut()
        .filter(|s| s.id == session_id)
        .ok_or(EngineError::NoActiveSession)?;
    session.engine.finish_classification(result)
}
