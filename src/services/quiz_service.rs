use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::database::SharedStore;
use crate::error::{Error, Result};
use crate::models::attempt::{AssessmentRef, AttemptRecord, Submission};
use crate::models::course::Module;
use crate::models::event::ProgressEvent;
use crate::models::question::PublicQuestion;
use crate::services::attempt_service::{AttemptService, AttemptStanding};
use crate::services::gating_service::ModuleState;
use crate::services::grading_service::{GradeReport, GradingService};
use crate::services::progress_service::{aggregate, CourseProgress, LearnerContext};
use crate::services::unlock_service::UnlockPolicy;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuizView {
    pub module_number: i32,
    pub passing_score: i32,
    pub required: bool,
    pub questions: Vec<PublicQuestion>,
    pub standing: AttemptStanding,
    pub attempts_remaining: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuizOutcome {
    pub module_number: i32,
    pub attempt_number: i32,
    pub attempts_remaining: Option<i32>,
    pub best_score: Option<i32>,
    pub report: GradeReport,
    pub module_state: ModuleState,
    pub course_progress: CourseProgress,
    pub events: Vec<ProgressEvent>,
}

#[derive(Clone)]
pub struct QuizService {
    store: SharedStore,
    policy: UnlockPolicy,
}

impl QuizService {
    pub fn new(store: SharedStore, policy: UnlockPolicy) -> Self {
        Self { store, policy }
    }

    fn quiz_module(ctx: &LearnerContext, module_number: i32) -> Result<Module> {
        let module = ctx.module(module_number)?;
        if !module.has_quiz {
            return Err(Error::NotFound(format!("Module {} has no quiz", module_number)));
        }
        if !ctx.state_of(module_number).is_open() {
            return Err(Error::ModuleLocked(module_number));
        }
        Ok(module)
    }

    /// Questions without the answer key, plus the learner's standing.
    pub async fn quiz(&self, learner_id: Uuid, course_id: Uuid, module_number: i32) -> Result<QuizView> {
        let mut tx = self.store.begin().await?;
        let ctx = LearnerContext::read(tx.as_mut(), learner_id, course_id).await?;
        let module = Self::quiz_module(&ctx, module_number)?;
        let assessment = AssessmentRef::ModuleQuiz(module.id);

        let questions = tx.questions(assessment).await?;
        let standing =
            AttemptService::standing(tx.as_mut(), learner_id, assessment, module.quiz_max_attempts).await?;

        Ok(QuizView {
            module_number,
            passing_score: module.quiz_passing_score,
            required: module.quiz_required,
            questions: questions.iter().map(|q| q.public_view()).collect(),
            attempts_remaining: standing.remaining(),
            standing,
        })
    }

    /// Grades and records one quiz attempt. Rejections happen before
    /// anything is written: enrollment, gating, attempt limit, prior pass,
    /// answer keys, then an empty bank.
    pub async fn submit_quiz(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
        module_number: i32,
        submission: impl Into<Submission>,
    ) -> Result<QuizOutcome> {
        let submission = submission.into();
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut ctx = LearnerContext::load(tx.as_mut(), learner_id, course_id).await?;
        let module = Self::quiz_module(&ctx, module_number)?;
        let assessment = AssessmentRef::ModuleQuiz(module.id);

        AttemptService::standing(tx.as_mut(), learner_id, assessment, module.quiz_max_attempts)
            .await?
            .ensure_open()?;

        let questions = tx.questions(assessment).await?;
        GradingService::validate_answer_keys(&questions, &submission.answers)?;
        let report = GradingService::grade(&questions, &submission.answers, module.quiz_passing_score);
        if report.total_points == 0 {
            return Err(Error::ZeroPointAssessment);
        }

        let record = AttemptService::record_attempt(
            tx.as_mut(),
            learner_id,
            assessment,
            module.quiz_max_attempts,
            &submission,
            &report,
            now,
        )
        .await?;

        let progress = ctx.ensure_progress(tx.as_mut(), &module, now).await?;
        progress.quiz_attempts_count = record.attempt_number;
        progress.quiz_best_score = Some(progress.quiz_best_score.map_or(record.score, |b| b.max(record.score)));
        progress.quiz_passed |= record.passed;
        progress.last_accessed_at = now;
        let best_score = progress.quiz_best_score;

        ctx.enrollment.last_accessed_at = Some(now);
        let events = ctx.settle(self.policy, now);
        ctx.persist(tx.as_mut()).await?;
        tx.commit().await?;

        let attempts_remaining = module
            .quiz_max_attempts
            .map(|max| (max - record.attempt_number).max(0));
        if !record.passed && attempts_remaining == Some(0) {
            tracing::warn!(
                %learner_id,
                %course_id,
                module_number,
                best_score = ?best_score,
                "quiz attempts exhausted"
            );
        }

        let states = ctx.states();
        Ok(QuizOutcome {
            module_number,
            attempt_number: record.attempt_number,
            attempts_remaining,
            best_score,
            report,
            module_state: ctx.state_of(module_number),
            course_progress: aggregate(&states),
            events,
        })
    }

    pub async fn attempt_history(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
        module_number: i32,
    ) -> Result<Vec<AttemptRecord>> {
        let mut tx = self.store.begin().await?;
        let ctx = LearnerContext::read(tx.as_mut(), learner_id, course_id).await?;
        let module = ctx.module(module_number)?;
        AttemptService::history(tx.as_mut(), learner_id, AssessmentRef::ModuleQuiz(module.id)).await
    }
}
