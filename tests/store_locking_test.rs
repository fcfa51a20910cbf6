use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use training_backend::{
    database::{MemoryStore, ProgressStore, StoreTx},
    error::Result,
    models::{
        attempt::{AnswerSheet, AssessmentRef, AttemptRecord},
        course::{Course, CourseOutline, Module},
        enrollment::Enrollment,
        module_progress::ModuleProgress,
        question::Question,
    },
    services::{certificate_service::CertificateIssuer, unlock_service::UnlockPolicy},
    AppState,
};
use uuid::Uuid;

/// Delegates to a `MemoryStore` and counts enrollment row locks.
#[derive(Clone)]
struct LockCountingStore {
    inner: MemoryStore,
    row_locks: Arc<AtomicUsize>,
}

impl LockCountingStore {
    fn row_locks(&self) -> usize {
        self.row_locks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressStore for LockCountingStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        Ok(Box::new(LockCountingTx {
            inner: self.inner.begin().await?,
            row_locks: self.row_locks.clone(),
        }))
    }
}

struct LockCountingTx {
    inner: Box<dyn StoreTx>,
    row_locks: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreTx for LockCountingTx {
    async fn course_outline(&mut self, course_id: Uuid) -> Result<Option<CourseOutline>> {
        self.inner.course_outline(course_id).await
    }

    async fn questions(&mut self, assessment: AssessmentRef) -> Result<Vec<Question>> {
        self.inner.questions(assessment).await
    }

    async fn enrollment_for_update(
        &mut self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>> {
        self.row_locks.fetch_add(1, Ordering::SeqCst);
        self.inner.enrollment_for_update(learner_id, course_id).await
    }

    async fn enrollment(&mut self, learner_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        self.inner.enrollment(learner_id, course_id).await
    }

    async fn certified_enrollments(&mut self, id_prefix: &str) -> Result<Vec<Enrollment>> {
        self.inner.certified_enrollments(id_prefix).await
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        self.inner.insert_enrollment(enrollment).await
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        self.inner.update_enrollment(enrollment).await
    }

    async fn delete_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        self.inner.delete_enrollment(enrollment).await
    }

    async fn module_progress(
        &mut self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Vec<ModuleProgress>> {
        self.inner.module_progress(learner_id, course_id).await
    }

    async fn upsert_module_progress(&mut self, progress: &ModuleProgress) -> Result<()> {
        self.inner.upsert_module_progress(progress).await
    }

    async fn attempts(
        &mut self,
        learner_id: Uuid,
        assessment: AssessmentRef,
    ) -> Result<Vec<AttemptRecord>> {
        self.inner.attempts(learner_id, assessment).await
    }

    async fn insert_attempt(&mut self, record: &AttemptRecord) -> Result<()> {
        self.inner.insert_attempt(record).await
    }

    async fn commit(&mut self) -> Result<()> {
        self.inner.commit().await
    }
}

fn sheet(entries: &[(i32, &str)]) -> AnswerSheet {
    entries.iter().map(|(n, a)| (*n, a.to_string())).collect()
}

#[tokio::test]
async fn views_read_without_taking_the_enrollment_lock() {
    let course = Course::new("lock-free-reads");
    let course_id = course.id;
    let module = Module::new(course_id, 1, 1).with_quiz(false, 70, None);
    let inner = MemoryStore::new();
    inner
        .publish_questions(
            AssessmentRef::ModuleQuiz(module.id),
            vec![Question::new(1, &["a", "b"], "a", 1)],
        )
        .await;
    inner
        .publish_questions(
            AssessmentRef::FinalExam(course_id),
            vec![Question::new(1, &["a", "b"], "b", 1).from_module(1)],
        )
        .await;
    inner
        .publish_course(CourseOutline::new(course, vec![module]))
        .await;

    let store = LockCountingStore {
        inner,
        row_locks: Arc::new(AtomicUsize::new(0)),
    };
    let state = AppState::with_settings(
        Arc::new(store.clone()),
        UnlockPolicy::RequiredQuizzesOnly,
        CertificateIssuer::new("ICMS", "locking-test-secret"),
    );
    let learner = Uuid::new_v4();

    state.enrollment_service.enroll(learner, course_id).await.unwrap();
    state.slide_service.mark_viewed(learner, course_id, 1, 1).await.unwrap();
    let exam = state
        .final_exam_service
        .submit_final_exam(learner, course_id, sheet(&[(1, "b")]))
        .await
        .unwrap();
    let issued = exam.certificate.expect("certificate issued on pass");

    let before = store.row_locks();
    let overview = state.progress_service.course_overview(learner, course_id).await.unwrap();
    assert!(overview.certificate_issued);
    state.quiz_service.quiz(learner, course_id, 1).await.unwrap();
    state.quiz_service.attempt_history(learner, course_id, 1).await.unwrap();
    let fetched = state.certificate_service.certificate(learner, course_id).await.unwrap();
    assert_eq!(fetched, issued);
    state
        .certificate_service
        .verify(&issued.certificate_number, &issued.verification_code)
        .await
        .unwrap();
    assert_eq!(store.row_locks(), before);

    state.slide_service.mark_viewed(learner, course_id, 1, 1).await.unwrap();
    assert_eq!(store.row_locks(), before + 1);
}
