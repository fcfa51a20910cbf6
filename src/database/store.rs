use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::attempt::{AssessmentRef, AttemptRecord};
use crate::models::course::CourseOutline;
use crate::models::enrollment::Enrollment;
use crate::models::module_progress::ModuleProgress;
use crate::models::question::Question;

/// Transactional record store behind the progression core.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
}

pub type SharedStore = Arc<dyn ProgressStore>;

/// One open transaction. Work is discarded unless `commit` is called.
///
/// `enrollment_for_update` takes the row lock that serializes every write to
/// the enrollment, its module progress and its attempts; mutating procedures
/// must call it before anything else.
#[async_trait]
pub trait StoreTx: Send {
    async fn course_outline(&mut self, course_id: Uuid) -> Result<Option<CourseOutline>>;

    /// Questions of an assessment ordered by `question_number`.
    async fn questions(&mut self, assessment: AssessmentRef) -> Result<Vec<Question>>;

    async fn enrollment_for_update(
        &mut self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>>;

    /// Plain read for views. Takes no lock, so it never waits on a writer.
    async fn enrollment(&mut self, learner_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>>;

    /// Enrollments with an issued certificate whose id starts with `id_prefix`
    /// (lower-case hex).
    async fn certified_enrollments(&mut self, id_prefix: &str) -> Result<Vec<Enrollment>>;

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<()>;

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<()>;

    /// Deletes the enrollment and all module progress attached to it.
    async fn delete_enrollment(&mut self, enrollment: &Enrollment) -> Result<()>;

    async fn module_progress(
        &mut self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Vec<ModuleProgress>>;

    async fn upsert_module_progress(&mut self, progress: &ModuleProgress) -> Result<()>;

    /// Attempts ordered by `attempt_number`.
    async fn attempts(
        &mut self,
        learner_id: Uuid,
        assessment: AssessmentRef,
    ) -> Result<Vec<AttemptRecord>>;

    /// Appends an attempt. Fails if the attempt number is already taken.
    async fn insert_attempt(&mut self, record: &AttemptRecord) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;
}
