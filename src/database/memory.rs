use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::database::store::{ProgressStore, StoreTx};
use crate::error::{Error, Result};
use crate::models::attempt::{AssessmentRef, AttemptRecord};
use crate::models::course::CourseOutline;
use crate::models::enrollment::Enrollment;
use crate::models::module_progress::ModuleProgress;
use crate::models::question::Question;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    courses: HashMap<Uuid, CourseOutline>,
    questions: HashMap<AssessmentRef, Vec<Question>>,
    /// Keyed by (learner, course).
    enrollments: HashMap<(Uuid, Uuid), Enrollment>,
    /// Keyed by (learner, module).
    progress: HashMap<(Uuid, Uuid), ModuleProgress>,
    attempts: Vec<AttemptRecord>,
}

/// In-process store. A transaction holds the whole state lock from `begin`
/// until it is dropped, works on a copy, and publishes the copy on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a course available for enrollment, stamping `published_at` if
    /// the outline has none.
    pub async fn publish_course(&self, mut outline: CourseOutline) {
        outline.course.published_at.get_or_insert_with(Utc::now);
        let mut state = self.state.lock().await;
        state.courses.insert(outline.course.id, outline);
    }

    pub async fn publish_questions(&self, assessment: AssessmentRef, mut questions: Vec<Question>) {
        questions.sort_by_key(|q| q.question_number);
        let mut state = self.state.lock().await;
        state.questions.insert(assessment, questions);
    }

    /// Every attempt ever recorded, in insertion order.
    pub async fn all_attempts(&self) -> Vec<AttemptRecord> {
        self.state.lock().await.attempts.clone()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn course_outline(&mut self, course_id: Uuid) -> Result<Option<CourseOutline>> {
        Ok(self.working.courses.get(&course_id).cloned())
    }

    async fn questions(&mut self, assessment: AssessmentRef) -> Result<Vec<Question>> {
        Ok(self
            .working
            .questions
            .get(&assessment)
            .cloned()
            .unwrap_or_default())
    }

    async fn enrollment_for_update(
        &mut self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>> {
        Ok(self.working.enrollments.get(&(learner_id, course_id)).cloned())
    }

    async fn enrollment(&mut self, learner_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        Ok(self.working.enrollments.get(&(learner_id, course_id)).cloned())
    }

    async fn certified_enrollments(&mut self, id_prefix: &str) -> Result<Vec<Enrollment>> {
        Ok(self
            .working
            .enrollments
            .values()
            .filter(|e| e.certificate_issued && e.id.simple().to_string().starts_with(id_prefix))
            .cloned()
            .collect())
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        let key = (enrollment.learner_id, enrollment.course_id);
        if self.working.enrollments.contains_key(&key) {
            return Err(Error::StorageFailure {
                message: "duplicate enrollment".to_string(),
                conflict: true,
            });
        }
        self.working.enrollments.insert(key, enrollment.clone());
        Ok(())
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        let key = (enrollment.learner_id, enrollment.course_id);
        match self.working.enrollments.get_mut(&key) {
            Some(slot) => {
                *slot = enrollment.clone();
                Ok(())
            }
            None => Err(Error::NotFound("Enrollment not found".to_string())),
        }
    }

    async fn delete_enrollment(&mut self, enrollment: &Enrollment) -> Result<()> {
        self.working
            .enrollments
            .remove(&(enrollment.learner_id, enrollment.course_id));
        self.working
            .progress
            .retain(|_, p| p.enrollment_id != enrollment.id);
        Ok(())
    }

    async fn module_progress(
        &mut self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Vec<ModuleProgress>> {
        Ok(self
            .working
            .progress
            .values()
            .filter(|p| p.learner_id == learner_id && p.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn upsert_module_progress(&mut self, progress: &ModuleProgress) -> Result<()> {
        self.working
            .progress
            .insert((progress.learner_id, progress.module_id), progress.clone());
        Ok(())
    }

    async fn attempts(
        &mut self,
        learner_id: Uuid,
        assessment: AssessmentRef,
    ) -> Result<Vec<AttemptRecord>> {
        let mut records: Vec<AttemptRecord> = self
            .working
            .attempts
            .iter()
            .filter(|a| a.learner_id == learner_id && a.assessment == assessment)
            .cloned()
            .collect();
        records.sort_by_key(|a| a.attempt_number);
        Ok(records)
    }

    async fn insert_attempt(&mut self, record: &AttemptRecord) -> Result<()> {
        let taken = self.working.attempts.iter().any(|a| {
            a.learner_id == record.learner_id
                && a.assessment == record.assessment
                && a.attempt_number == record.attempt_number
        });
        if taken {
            return Err(Error::StorageFailure {
                message: format!("attempt {} already recorded", record.attempt_number),
                conflict: true,
            });
        }
        self.working.attempts.push(record.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        *self.guard = self.working.clone();
        Ok(())
    }
}
