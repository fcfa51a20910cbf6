use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::database::{SharedStore, StoreTx};
use crate::error::{Error, Result};
use crate::models::attempt::{AssessmentRef, AttemptRecord, Submission};
use crate::models::event::ProgressEvent;
use crate::models::question::PublicQuestion;
use crate::services::attempt_service::{AttemptService, AttemptStanding};
use crate::services::certificate_service::{Certificate, CertificateIssuer};
use crate::services::grading_service::{GradeReport, GradingService};
use crate::services::progress_service::LearnerContext;
use crate::services::unlock_service::UnlockPolicy;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FinalExamView {
    pub course_id: Uuid,
    pub passing_score: i32,
    pub questions: Vec<PublicQuestion>,
    pub standing: AttemptStanding,
    pub attempts_remaining: Option<i32>,
    pub certificate_issued: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FinalExamOutcome {
    pub attempt_number: i32,
    pub attempts_remaining: Option<i32>,
    pub best_score: Option<i32>,
    pub report: GradeReport,
    pub certificate: Option<Certificate>,
    pub events: Vec<ProgressEvent>,
    /// Every attempt so far, including this one.
    pub history: Vec<AttemptRecord>,
}

#[derive(Clone)]
pub struct FinalExamService {
    store: SharedStore,
    policy: UnlockPolicy,
    issuer: CertificateIssuer,
}

impl FinalExamService {
    pub fn new(store: SharedStore, policy: UnlockPolicy, issuer: CertificateIssuer) -> Self {
        Self { store, policy, issuer }
    }

    /// Loads the learner and re-evaluates the unlock predicate, so a missed
    /// unlock repairs itself on the next exam access. Returns whether the
    /// unlock happened here.
    async fn open_exam(
        &self,
        tx: &mut dyn StoreTx,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<(LearnerContext, bool)> {
        let mut ctx = LearnerContext::load(tx, learner_id, course_id).await?;
        if !ctx.outline.course.has_final_exam {
            return Err(Error::NotFound(format!("Course {} has no final exam", course_id)));
        }

        let was_unlocked = ctx.enrollment.final_exam_unlocked;
        ctx.settle(self.policy, Utc::now());
        if !ctx.enrollment.final_exam_unlocked {
            return Err(Error::PrerequisiteNotMet);
        }
        let repaired = !was_unlocked;
        if repaired {
            tracing::warn!(%learner_id, %course_id, "final exam unlock repaired on access");
        }
        Ok((ctx, repaired))
    }

    pub async fn access(&self, learner_id: Uuid, course_id: Uuid) -> Result<FinalExamView> {
        let mut tx = self.store.begin().await?;
        let (mut ctx, repaired) = self.open_exam(tx.as_mut(), learner_id, course_id).await?;
        if repaired {
            ctx.persist(tx.as_mut()).await?;
        }
        let course = &ctx.outline.course;
        let assessment = AssessmentRef::FinalExam(course.id);

        let questions = tx.questions(assessment).await?;
        let standing =
            AttemptService::standing(tx.as_mut(), learner_id, assessment, course.final_exam_max_attempts).await?;

        tx.commit().await?;

        Ok(FinalExamView {
            course_id,
            passing_score: course.final_exam_passing_score,
            questions: questions.iter().map(|q| q.public_view()).collect(),
            attempts_remaining: standing.remaining(),
            standing,
            certificate_issued: ctx.enrollment.certificate_issued,
        })
    }

    pub async fn submit_final_exam(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
        submission: impl Into<Submission>,
    ) -> Result<FinalExamOutcome> {
        let submission = submission.into();
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let (mut ctx, _) = self.open_exam(tx.as_mut(), learner_id, course_id).await?;
        let course = ctx.outline.course.clone();
        let assessment = AssessmentRef::FinalExam(course.id);

        AttemptService::standing(tx.as_mut(), learner_id, assessment, course.final_exam_max_attempts)
            .await?
            .ensure_open()?;

        let questions = tx.questions(assessment).await?;
        GradingService::validate_answer_keys(&questions, &submission.answers)?;
        let report = GradingService::grade(&questions, &submission.answers, course.final_exam_passing_score);
        if report.total_points == 0 {
            return Err(Error::ZeroPointAssessment);
        }

        let record = AttemptService::record_attempt(
            tx.as_mut(),
            learner_id,
            assessment,
            course.final_exam_max_attempts,
            &submission,
            &report,
            now,
        )
        .await?;

        let enrollment = &mut ctx.enrollment;
        enrollment.final_exam_attempts = record.attempt_number;
        enrollment.final_exam_best_score = Some(
            enrollment
                .final_exam_best_score
                .map_or(record.score, |b| b.max(record.score)),
        );
        enrollment.last_accessed_at = Some(now);

        let mut events = Vec::new();
        if record.passed {
            events.extend(self.issuer.on_final_exam_passed(&course, enrollment, now));
        }
        let best_score = enrollment.final_exam_best_score;

        events.extend(ctx.settle(self.policy, now));
        ctx.persist(tx.as_mut()).await?;
        let history = AttemptService::history(tx.as_mut(), learner_id, assessment).await?;
        tx.commit().await?;

        let attempts_remaining = course
            .final_exam_max_attempts
            .map(|max| (max - record.attempt_number).max(0));
        if !record.passed && attempts_remaining == Some(0) {
            tracing::warn!(
                %learner_id,
                %course_id,
                best_score = ?best_score,
                "final exam attempts exhausted"
            );
        }

        Ok(FinalExamOutcome {
            attempt_number: record.attempt_number,
            attempts_remaining,
            best_score,
            report,
            certificate: self.issuer.certificate(&ctx.enrollment)?,
            events,
            history,
        })
    }
}
