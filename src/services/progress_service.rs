//! Course-level aggregation and the single recompute path every mutation
//! goes through.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::database::{SharedStore, StoreTx};
use crate::error::{Error, Result};
use crate::models::attempt::AssessmentRef;
use crate::models::course::{CourseOutline, Module};
use crate::models::enrollment::{Enrollment, EnrollmentStatus};
use crate::models::event::ProgressEvent;
use crate::models::module_progress::ModuleProgress;
use crate::services::attempt_service::AttemptService;
use crate::services::gating_service::{self, ModuleState};
use crate::services::grading_service::percentage;
use crate::services::unlock_service::{self, UnlockPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CourseProgress {
    pub completed_modules: i32,
    pub total_modules: i32,
    pub progress_percentage: i32,
    /// Next module to resume, capped at the last module.
    pub current_module_number: i32,
}

impl CourseProgress {
    pub fn all_completed(&self) -> bool {
        self.total_modules > 0 && self.completed_modules == self.total_modules
    }
}

/// Pure fold over derived module states.
pub fn aggregate(states: &[ModuleState]) -> CourseProgress {
    let total_modules = states.len() as i32;
    let completed_modules = states.iter().filter(|s| **s == ModuleState::Completed).count() as i32;
    CourseProgress {
        completed_modules,
        total_modules,
        progress_percentage: percentage(completed_modules, total_modules),
        current_module_number: (completed_modules + 1).min(total_modules.max(1)),
    }
}

/// Everything one learner has in one course. Mutations load it under the
/// enrollment lock; views read it without one.
pub(crate) struct LearnerContext {
    pub outline: CourseOutline,
    pub enrollment: Enrollment,
    /// Keyed by module id.
    pub progress: HashMap<Uuid, ModuleProgress>,
    dirty: HashSet<Uuid>,
}

impl LearnerContext {
    pub async fn load(tx: &mut dyn StoreTx, learner_id: Uuid, course_id: Uuid) -> Result<Self> {
        Self::fetch(tx, learner_id, course_id, true).await
    }

    /// Same as [`load`](Self::load) without the row lock. The result must not
    /// be persisted.
    pub async fn read(tx: &mut dyn StoreTx, learner_id: Uuid, course_id: Uuid) -> Result<Self> {
        Self::fetch(tx, learner_id, course_id, false).await
    }

    async fn fetch(tx: &mut dyn StoreTx, learner_id: Uuid, course_id: Uuid, lock: bool) -> Result<Self> {
        let outline = tx
            .course_outline(course_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Course {} not found", course_id)))?;
        let enrollment = if lock {
            tx.enrollment_for_update(learner_id, course_id).await?
        } else {
            tx.enrollment(learner_id, course_id).await?
        };
        let enrollment = enrollment.ok_or(Error::NotEnrolled(course_id))?;
        let progress = tx
            .module_progress(learner_id, course_id)
            .await?
            .into_iter()
            .map(|p| (p.module_id, p))
            .collect();

        Ok(Self {
            outline,
            enrollment,
            progress,
            dirty: HashSet::new(),
        })
    }

    pub fn learner_id(&self) -> Uuid {
        self.enrollment.learner_id
    }

    pub fn module(&self, module_number: i32) -> Result<Module> {
        self.outline
            .module(module_number)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Module {} not found", module_number)))
    }

    pub fn states(&self) -> Vec<ModuleState> {
        gating_service::derive_states(&self.outline.modules, &self.progress)
    }

    pub fn state_of(&self, module_number: i32) -> ModuleState {
        self.outline
            .modules
            .iter()
            .position(|m| m.module_number == module_number)
            .and_then(|idx| self.states().get(idx).copied())
            .unwrap_or(ModuleState::Locked)
    }

    /// Returns the module's progress row, creating it on first engagement.
    /// New rows for quiz modules start from what the attempt ledger already
    /// holds.
    pub async fn ensure_progress(
        &mut self,
        tx: &mut dyn StoreTx,
        module: &Module,
        now: DateTime<Utc>,
    ) -> Result<&mut ModuleProgress> {
        if !self.progress.contains_key(&module.id) {
            let mut fresh = ModuleProgress::new(&self.enrollment, module, now);
            if module.has_quiz {
                let standing = AttemptService::standing(
                    tx,
                    self.learner_id(),
                    AssessmentRef::ModuleQuiz(module.id),
                    module.quiz_max_attempts,
                )
                .await?;
                standing.seed(&mut fresh);
            }
            self.progress.insert(module.id, fresh);
        }
        self.dirty.insert(module.id);
        self.progress
            .get_mut(&module.id)
            .ok_or_else(|| Error::storage("module progress missing after insert"))
    }

    /// Recomputes every cached value from module progress: completion flags,
    /// percentage, resume point, status and the exam unlock. Returns the
    /// events that fired.
    pub fn settle(&mut self, policy: UnlockPolicy, now: DateTime<Utc>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();

        for module in &self.outline.modules {
            if let Some(p) = self.progress.get_mut(&module.id) {
                if gating_service::settle_module(module, p, now) {
                    self.dirty.insert(module.id);
                    tracing::info!(
                        learner_id = %p.learner_id,
                        course_id = %p.course_id,
                        module_number = module.module_number,
                        "module completed"
                    );
                    events.push(ProgressEvent::ModuleCompleted {
                        module_number: module.module_number,
                    });
                }
            }
        }

        let summary = aggregate(&self.states());
        let course = &self.outline.course;
        let enrollment = &mut self.enrollment;

        enrollment.current_module_number = summary.current_module_number;
        enrollment.progress_percentage = if enrollment.final_exam_passed {
            100
        } else {
            summary.progress_percentage
        };

        if summary.all_completed() && !course.has_final_exam {
            enrollment.mark_completed(now);
        }

        if course.has_final_exam
            && unlock_service::apply_unlock(enrollment, &self.outline.modules, &self.progress, policy)
        {
            tracing::info!(
                learner_id = %enrollment.learner_id,
                course_id = %course.id,
                "final exam unlocked"
            );
            events.push(ProgressEvent::FinalExamUnlocked { course_id: course.id });
        }

        events
    }

    /// Writes touched progress rows and the enrollment. The caller commits.
    pub async fn persist(&mut self, tx: &mut dyn StoreTx) -> Result<()> {
        for module_id in self.dirty.drain() {
            if let Some(p) = self.progress.get(&module_id) {
                tx.upsert_module_progress(p).await?;
            }
        }
        tx.update_enrollment(&self.enrollment).await
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModuleStatus {
    pub module_number: i32,
    pub state: ModuleState,
    pub total_slides: i32,
    pub slides_viewed: i32,
    pub current_slide: i32,
    pub has_quiz: bool,
    pub quiz_required: bool,
    pub quiz_passed: bool,
    pub quiz_best_score: Option<i32>,
    pub quiz_attempts: i32,
    /// `None` when the quiz allows unlimited attempts or there is no quiz.
    pub quiz_attempts_remaining: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FinalExamStatus {
    pub available: bool,
    pub unlocked: bool,
    pub passed: bool,
    pub best_score: Option<i32>,
    pub attempts: i32,
    pub attempts_remaining: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CourseOverview {
    pub course_id: Uuid,
    pub enrollment_id: Uuid,
    pub status: EnrollmentStatus,
    pub progress: CourseProgress,
    pub modules: Vec<ModuleStatus>,
    pub final_exam: FinalExamStatus,
    pub certificate_issued: bool,
}

#[derive(Clone)]
pub struct ProgressService {
    store: SharedStore,
    policy: UnlockPolicy,
}

impl ProgressService {
    pub fn new(store: SharedStore, policy: UnlockPolicy) -> Self {
        Self { store, policy }
    }

    /// Read-only view. Derived values are recomputed in memory; nothing is
    /// committed.
    pub async fn course_overview(&self, learner_id: Uuid, course_id: Uuid) -> Result<CourseOverview> {
        let mut tx = self.store.begin().await?;
        let mut ctx = LearnerContext::read(tx.as_mut(), learner_id, course_id).await?;
        ctx.settle(self.policy, Utc::now());

        let states = ctx.states();
        let progress = aggregate(&states);
        let modules = ctx
            .outline
            .modules
            .iter()
            .zip(states)
            .map(|(module, state)| {
                let p = ctx.progress.get(&module.id);
                let quiz_attempts = p.map_or(0, |p| p.quiz_attempts_count);
                ModuleStatus {
                    module_number: module.module_number,
                    state,
                    total_slides: module.total_slides,
                    slides_viewed: p.map_or(0, ModuleProgress::slides_viewed),
                    current_slide: p.map_or(1, |p| p.current_slide),
                    has_quiz: module.has_quiz,
                    quiz_required: module.quiz_required,
                    quiz_passed: p.is_some_and(|p| p.quiz_passed),
                    quiz_best_score: p.and_then(|p| p.quiz_best_score),
                    quiz_attempts,
                    quiz_attempts_remaining: module
                        .quiz_max_attempts
                        .filter(|_| module.has_quiz)
                        .map(|max| (max - quiz_attempts).max(0)),
                }
            })
            .collect();

        let course = &ctx.outline.course;
        let e = &ctx.enrollment;
        let final_exam = FinalExamStatus {
            available: course.has_final_exam,
            unlocked: e.final_exam_unlocked,
            passed: e.final_exam_passed,
            best_score: e.final_exam_best_score,
            attempts: e.final_exam_attempts,
            attempts_remaining: course
                .final_exam_max_attempts
                .filter(|_| course.has_final_exam)
                .map(|max| (max - e.final_exam_attempts).max(0)),
        };

        Ok(CourseOverview {
            course_id,
            enrollment_id: e.id,
            status: e.status,
            progress,
            modules,
            final_exam,
            certificate_issued: e.certificate_issued,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ModuleState::*;

    #[test]
    fn fresh_course_resumes_at_first_module() {
        let summary = aggregate(&[Available, Locked, Locked]);
        assert_eq!(summary.completed_modules, 0);
        assert_eq!(summary.progress_percentage, 0);
        assert_eq!(summary.current_module_number, 1);
        assert!(!summary.all_completed());
    }

    #[test]
    fn two_of_three_modules() {
        let summary = aggregate(&[Completed, Completed, InProgress]);
        assert_eq!(summary.progress_percentage, 67);
        assert_eq!(summary.current_module_number, 3);
    }

    #[test]
    fn current_module_is_capped() {
        let summary = aggregate(&[Completed, Completed]);
        assert_eq!(summary.progress_percentage, 100);
        assert_eq!(summary.current_module_number, 2);
        assert!(summary.all_completed());
    }

    #[test]
    fn empty_course_is_never_complete() {
        let summary = aggregate(&[]);
        assert_eq!(summary.progress_percentage, 0);
        assert_eq!(summary.current_module_number, 1);
        assert!(!summary.all_completed());
    }
}
