mod common;

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use common::*;
use eyecheck::acuity::{ClassificationResponse, SessionState, Transition};
use eyecheck::astigmatism::{AstigmatismVerdict, Question};
use eyecheck::models::{Eye, EyeStatus, PassFail, SubjectDraft, Tier, YesNo};
use eyecheck::vision::GatePolicy;
use eyecheck::{Database, EngineError, EngineSettings, ResultStore, ScreeningController};

fn controller(
    classifier: ScriptedClassifier,
    db: Database,
    settings: EngineSettings,
) -> ScreeningController<ScriptedClassifier, Database> {
    ScreeningController::new(classifier, db, settings)
}

async fn run_to_both_complete<S: ResultStore>(ctl: &ScreeningController<ScriptedClassifier, S>) {
    ctl.start_session(subject()).await.unwrap();
    ctl.select_eye(Eye::Right).await.unwrap();
    ctl.start_test(true).await.unwrap();
    answer_all(ctl, true).await;
    ctl.advance().await.unwrap();
    ctl.start_test(true).await.unwrap();
    answer_all(ctl, false).await;
    ctl.advance().await.unwrap();
}

async fn answer_possible_astigmatism<S: ResultStore>(
    ctl: &ScreeningController<ScriptedClassifier, S>,
) {
    ctl.answer_astigmatism(Question::LeftEyeClarity, YesNo::Yes)
        .await
        .unwrap();
    ctl.answer_astigmatism(Question::RightEyeClarity, YesNo::No)
        .await
        .unwrap();
    ctl.answer_astigmatism(Question::Glare, YesNo::No)
        .await
        .unwrap();
    let verdict = ctl
        .answer_astigmatism(Question::Headache, YesNo::Yes)
        .await
        .unwrap();
    assert_eq!(verdict, Some(AstigmatismVerdict::Possible));
}

#[tokio::test]
async fn full_screening_is_classified_and_persisted() {
    let (_dir, db) = open_database();
    let classifier = ScriptedClassifier::new(vec![Step::Respond(ClassificationResponse {
        left_eye_prediction: 0,
        right_eye_prediction: 1,
    })]);
    let ctl = controller(classifier.clone(), db.clone(), test_settings());

    ctl.start_session(subject()).await.unwrap();
    ctl.select_eye(Eye::Right).await.unwrap();
    ctl.start_capture(StaticSource(right_eye_frame())).await.unwrap();
    wait_for_status(&ctl, EyeStatus::OnlyRight).await;

    let readiness = ctl.calibration_readiness().await.unwrap();
    assert!(readiness.is_ready());
    assert_eq!(readiness.distance_cm, Some(37.5));

    ctl.start_test(false).await.unwrap();
    assert_eq!(
        answer_all(&ctl, true).await,
        Transition::EyeSealed {
            eye: Eye::Right,
            score: 10
        }
    );

    ctl.stop_capture().await.unwrap();
    assert_eq!(
        ctl.advance().await.unwrap(),
        Transition::Calibrating { eye: Eye::Left }
    );
    assert_eq!(ctl.eye_status().await.unwrap(), EyeStatus::None);

    ctl.start_test(true).await.unwrap();
    answer_all(&ctl, false).await;
    assert_eq!(
        ctl.advance().await.unwrap(),
        Transition::BothComplete {
            left_score: 0,
            right_score: 10
        }
    );

    let outcome = ctl.classify().await.unwrap();
    assert!(!outcome.left_pass);
    assert!(outcome.right_pass);
    assert_eq!(outcome.tier, Tier::Mild);

    let requests = classifier.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].age, 25);
    assert_eq!(requests[0].eyeglasses, YesNo::No);
    assert_eq!(requests[0].hobby, "Reading");
    assert_eq!(requests[0].preferred_distance, 30);
    assert_eq!(requests[0].left_eye_score, 0);
    assert_eq!(requests[0].right_eye_score, 10);

    answer_possible_astigmatism(&ctl).await;

    let stored = ctl.finish("user-1").await.unwrap();
    assert_eq!(stored.record.left_eye_result, PassFail::Fail);
    assert_eq!(stored.record.right_eye_result, PassFail::Pass);
    assert_eq!(stored.record.overall_result, Tier::Mild);
    assert!(stored.record.schedule_follow_up);
    assert!(ctl.snapshot().await.is_none());

    let history = db.list_results("user-1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, stored.id);
    assert_eq!(history[0].record.right_eye_answer, YesNo::No);
    assert_eq!(
        history[0].record.astigmatism_result,
        AstigmatismVerdict::Possible
    );
}

#[tokio::test]
async fn discarding_mid_test_persists_nothing() {
    let (_dir, db) = open_database();
    let ctl = controller(ScriptedClassifier::default(), db.clone(), test_settings());

    ctl.start_session(subject()).await.unwrap();
    ctl.select_eye(Eye::Right).await.unwrap();
    ctl.start_capture(StaticSource(right_eye_frame())).await.unwrap();
    ctl.start_test(true).await.unwrap();
    for _ in 0..3 {
        let shown = ctl
            .snapshot()
            .await
            .unwrap()
            .engine
            .current_trial
            .unwrap()
            .direction;
        ctl.submit_answer(shown).await.unwrap();
    }

    ctl.discard().await;

    assert!(ctl.snapshot().await.is_none());
    assert!(db.list_results("user-1").await.unwrap().is_empty());
    let err = ctl.finish("user-1").await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<EngineError>(),
        Some(&EngineError::NoActiveSession)
    );
}

#[tokio::test]
async fn invalid_subject_never_opens_a_session() {
    let (_dir, db) = open_database();
    let ctl = controller(ScriptedClassifier::default(), db, test_settings());

    let err = ctl
        .start_session(SubjectDraft {
            age: Some(5),
            ..subject()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(ctl.snapshot().await.is_none());

    ctl.start_session(subject()).await.unwrap();
    assert!(matches!(
        ctl.start_session(subject()).await,
        Err(EngineError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn enforced_gate_blocks_until_forced() {
    let (_dir, db) = open_database();
    let mut settings = test_settings();
    settings.calibration.gate_policy = GatePolicy::Enforced;
    let ctl = controller(ScriptedClassifier::default(), db, settings);

    ctl.start_session(subject()).await.unwrap();
    ctl.select_eye(Eye::Left).await.unwrap();

    assert!(matches!(
        ctl.start_test(false).await,
        Err(EngineError::SensingUnavailable(_))
    ));
    assert!(matches!(
        ctl.start_test(true).await.unwrap(),
        Transition::Testing { eye: Eye::Left, readiness } if !readiness.is_ready()
    ));
}

#[tokio::test]
async fn classifier_timeout_leaves_scores_for_retry() {
    let (_dir, db) = open_database();
    let classifier = ScriptedClassifier::new(vec![
        Step::Delay(
            Duration::from_millis(500),
            ClassificationResponse::new(true, true),
        ),
        Step::Respond(ClassificationResponse::new(true, false)),
    ]);
    let settings = EngineSettings {
        classifier_timeout_ms: 50,
        ..test_settings()
    };
    let ctl = controller(classifier, db, settings);
    run_to_both_complete(&ctl).await;

    let err = ctl.classify().await.unwrap_err();
    assert!(matches!(err, EngineError::ClassificationTimeout(_)));
    assert!(err.is_retryable());

    let snapshot = ctl.snapshot().await.unwrap();
    assert_eq!(snapshot.engine.state, SessionState::BothComplete);
    assert_eq!(snapshot.engine.left_score, Some(0));
    assert_eq!(snapshot.engine.right_score, Some(10));
    assert!(!snapshot.engine.classification_in_flight);

    let outcome = ctl.classify().await.unwrap();
    assert_eq!(outcome.tier, Tier::Mild);
}

#[tokio::test]
async fn abandoned_classify_can_be_retried() {
    let (_dir, db) = open_database();
    let classifier = ScriptedClassifier::new(vec![
        Step::Delay(
            Duration::from_millis(300),
            ClassificationResponse::new(true, true),
        ),
        Step::Respond(ClassificationResponse::new(false, true)),
    ]);
    let settings = EngineSettings {
        classifier_timeout_ms: 100,
        ..test_settings()
    };
    let ctl = controller(classifier.clone(), db, settings);
    run_to_both_complete(&ctl).await;

    let abandoned = tokio::time::timeout(Duration::from_millis(20), ctl.classify()).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(250)).await;
    let snapshot = ctl.snapshot().await.unwrap();
    assert_eq!(snapshot.engine.state, SessionState::BothComplete);
    assert!(!snapshot.engine.classification_in_flight);

    let outcome = ctl.classify().await.unwrap();
    assert_eq!(outcome.tier, Tier::Mild);
    assert_eq!(classifier.requests().len(), 2);
}

#[tokio::test]
async fn abandoned_classify_still_applies_late_outcome() {
    let (_dir, db) = open_database();
    let classifier = ScriptedClassifier::new(vec![Step::Delay(
        Duration::from_millis(100),
        ClassificationResponse::new(true, true),
    )]);
    let ctl = controller(classifier, db, test_settings());
    run_to_both_complete(&ctl).await;

    assert!(tokio::time::timeout(Duration::from_millis(20), ctl.classify())
        .await
        .is_err());

    tokio::time::sleep(Duration::from_millis(300)).await;
    let snapshot = ctl.snapshot().await.unwrap();
    assert!(matches!(snapshot.engine.state, SessionState::Classified(_)));
    assert!(!snapshot.engine.classification_in_flight);
}

#[tokio::test]
async fn dropping_controller_stops_capture() {
    let (_dir, db) = open_database();
    let ctl = controller(ScriptedClassifier::default(), db, test_settings());
    let source = CountingSource::default();

    ctl.start_session(subject()).await.unwrap();
    ctl.select_eye(Eye::Right).await.unwrap();
    ctl.start_capture(source.clone()).await.unwrap();
    wait_for_status(&ctl, EyeStatus::OnlyRight).await;

    drop(ctl);
    tokio::time::sleep(Duration::from_millis(30)).await;
    let at_drop = source.calls();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(source.calls(), at_drop);
}

#[tokio::test]
async fn second_classification_is_rejected_while_first_is_pending() {
    let (_dir, db) = open_database();
    let classifier = ScriptedClassifier::new(vec![Step::Delay(
        Duration::from_millis(200),
        ClassificationResponse::new(false, false),
    )]);
    let ctl = controller(classifier.clone(), db, test_settings());
    run_to_both_complete(&ctl).await;

    let first = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.classify().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        ctl.classify().await.unwrap_err(),
        EngineError::ClassificationInFlight
    );

    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome.tier, Tier::AtRisk);
    assert_eq!(classifier.requests().len(), 1);
}

#[tokio::test]
async fn malformed_prediction_is_a_classification_failure() {
    let (_dir, db) = open_database();
    let classifier = ScriptedClassifier::new(vec![Step::Respond(ClassificationResponse {
        left_eye_prediction: 2,
        right_eye_prediction: 1,
    })]);
    let ctl = controller(classifier, db, test_settings());
    run_to_both_complete(&ctl).await;

    assert!(matches!(
        ctl.classify().await,
        Err(EngineError::ClassificationFailure(_))
    ));
    assert_eq!(
        ctl.snapshot().await.unwrap().engine.state,
        SessionState::BothComplete
    );
}

#[tokio::test]
async fn failed_save_keeps_session_for_retry() {
    let (_dir, db) = open_database();
    let store = FlakyStore {
        db: db.clone(),
        fail_next_save: AtomicBool::new(true),
    };
    let classifier =
        ScriptedClassifier::new(vec![Step::Respond(ClassificationResponse::new(true, true))]);
    let ctl = ScreeningController::new(classifier, store, test_settings());
    run_to_both_complete(&ctl).await;
    ctl.classify().await.unwrap();

    let err = ctl.finish("user-1").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::InconsistentAnswerState(_))
    ));

    answer_possible_astigmatism(&ctl).await;
    let err = ctl.finish("user-1").await.unwrap_err();
    assert!(err.downcast_ref::<EngineError>().is_none());
    assert!(ctl.snapshot().await.is_some());

    let stored = ctl.finish("user-1").await.unwrap();
    assert_eq!(stored.record.overall_result, Tier::Healthy);
    assert_eq!(db.list_results("user-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn history_lists_latest_screening_first() {
    let (_dir, db) = open_database();
    let classifier = ScriptedClassifier::new(vec![
        Step::Respond(ClassificationResponse::new(false, false)),
        Step::Respond(ClassificationResponse::new(true, true)),
    ]);
    let ctl = controller(classifier, db.clone(), test_settings());

    for _ in 0..2 {
        run_to_both_complete(&ctl).await;
        ctl.classify().await.unwrap();
        answer_possible_astigmatism(&ctl).await;
        ctl.finish("user-1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let history = db.list_results("user-1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].record.overall_result, Tier::Healthy);
    assert_eq!(history[1].record.overall_result, Tier::AtRisk);

    let page = db.list_results_paginated("user-1", 1, 1).await.unwrap();
    assert_eq!(page[0].id, history[1].id);
}
