use std::sync::Arc;

use training_backend::{
    database::MemoryStore,
    error::Error,
    models::{
        attempt::{AnswerSheet, AssessmentRef},
        course::{Course, CourseOutline, Module},
        question::Question,
    },
    services::{
        certificate_service::CertificateIssuer, gating_service::ModuleState,
        unlock_service::UnlockPolicy,
    },
    AppState,
};
use uuid::Uuid;

async fn setup(total_slides: i32, max_attempts: Option<i32>) -> (MemoryStore, AppState, Uuid, Uuid) {
    let course = Course::new("concurrency");
    let module = Module::new(course.id, 1, total_slides).with_quiz(true, 70, max_attempts);
    let store = MemoryStore::new();
    store
        .publish_questions(
            AssessmentRef::ModuleQuiz(module.id),
            vec![
                Question::new(1, &["a", "b"], "a", 1),
                Question::new(2, &["a", "b"], "b", 1),
            ],
        )
        .await;
    store
        .publish_course(CourseOutline::new(course.clone(), vec![module]))
        .await;

    let state = AppState::with_settings(
        Arc::new(store.clone()),
        UnlockPolicy::AllQuizzes,
        CertificateIssuer::new("ICMS", "concurrency-secret"),
    );
    let learner = Uuid::new_v4();
    state.enrollment_service.enroll(learner, course.id).await.unwrap();
    (store, state, learner, course.id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_never_exceed_the_limit() {
    let (store, state, learner, course_id) = setup(1, Some(3)).await;
    let wrong: AnswerSheet = [(1, "b".to_string()), (2, "a".to_string())].into_iter().collect();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let state = state.clone();
            let answers = wrong.clone();
            tokio::spawn(async move {
                state
                    .quiz_service
                    .submit_quiz(learner, course_id, 1, answers)
                    .await
            })
        })
        .collect();

    let mut numbers = Vec::new();
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => numbers.push(outcome.attempt_number),
            Err(Error::AttemptLimitExceeded(3)) => refused += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    numbers.sort_unstable();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(refused, 5);

    let mut recorded: Vec<i32> = store
        .all_attempts()
        .await
        .iter()
        .map(|a| a.attempt_number)
        .collect();
    recorded.sort_unstable();
    assert_eq!(recorded, vec![1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_passes_are_recorded_once() {
    let (store, state, learner, course_id) = setup(1, None).await;
    let right: AnswerSheet = [(1, "a".to_string()), (2, "b".to_string())].into_iter().collect();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let state = state.clone();
            let answers = right.clone();
            tokio::spawn(async move {
                state
                    .quiz_service
                    .submit_quiz(learner, course_id, 1, answers)
                    .await
            })
        })
        .collect();

    let mut passed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                assert!(outcome.report.passed);
                passed += 1;
            }
            Err(Error::AlreadyPassed) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(passed, 1);
    assert_eq!(store.all_attempts().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_slide_views_are_all_kept() {
    let (_store, state, learner, course_id) = setup(12, None).await;

    let handles: Vec<_> = (1..=12)
        .map(|slide| {
            let state = state.clone();
            tokio::spawn(async move {
                state
                    .slide_service
                    .mark_viewed(learner, course_id, 1, slide)
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let overview = state
        .progress_service
        .course_overview(learner, course_id)
        .await
        .unwrap();
    assert_eq!(overview.modules[0].slides_viewed, 12);
    // Quiz still outstanding.
    assert_eq!(overview.modules[0].state, ModuleState::InProgress);
}
