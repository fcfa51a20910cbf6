use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::database::StoreTx;
use crate::error::{Error, Result};
use crate::models::attempt::{AssessmentRef, AttemptRecord, Submission};
use crate::models::enrollment::Enrollment;
use crate::models::module_progress::ModuleProgress;
use crate::services::grading_service::GradeReport;

/// What the ledger says about one learner and one assessment. Everything
/// here is folded from attempt records, never from cached counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AttemptStanding {
    pub taken: i32,
    pub best_score: Option<i32>,
    pub passed: bool,
    /// `None` means unlimited.
    pub max_attempts: Option<i32>,
}

impl AttemptStanding {
    pub fn from_records(records: &[AttemptRecord], max_attempts: Option<i32>) -> Self {
        Self {
            taken: records.len() as i32,
            best_score: records.iter().map(|r| r.score).max(),
            passed: records.iter().any(|r| r.passed),
            max_attempts,
        }
    }

    pub fn remaining(&self) -> Option<i32> {
        self.max_attempts.map(|max| (max - self.taken).max(0))
    }

    pub fn exhausted(&self) -> bool {
        self.remaining() == Some(0)
    }

    /// Limit first, then already-passed.
    pub fn ensure_open(&self) -> Result<()> {
        if let Some(max) = self.max_attempts {
            if self.taken >= max {
                return Err(Error::AttemptLimitExceeded(max));
            }
        }
        if self.passed {
            return Err(Error::AlreadyPassed);
        }
        Ok(())
    }

    pub fn next_attempt_number(&self) -> i32 {
        self.taken + 1
    }

    /// Copies the quiz summary onto a freshly created progress row, so a
    /// re-enrolled learner keeps what the retained attempts already prove.
    pub fn seed(&self, progress: &mut ModuleProgress) {
        progress.quiz_attempts_count = self.taken;
        progress.quiz_best_score = self.best_score;
        progress.quiz_passed = self.passed;
    }

    /// Final exam counterpart of [`seed`](Self::seed). The pass itself is
    /// applied by the certificate issuer.
    pub fn seed_enrollment(&self, enrollment: &mut Enrollment) {
        enrollment.final_exam_attempts = self.taken;
        enrollment.final_exam_best_score = self.best_score;
    }
}

pub struct AttemptService;

impl AttemptService {
    /// All attempts in submission order.
    pub async fn history(
        tx: &mut dyn StoreTx,
        learner_id: Uuid,
        assessment: AssessmentRef,
    ) -> Result<Vec<AttemptRecord>> {
        tx.attempts(learner_id, assessment).await
    }

    pub async fn standing(
        tx: &mut dyn StoreTx,
        learner_id: Uuid,
        assessment: AssessmentRef,
        max_attempts: Option<i32>,
    ) -> Result<AttemptStanding> {
        let records = Self::history(tx, learner_id, assessment).await?;
        Ok(AttemptStanding::from_records(&records, max_attempts))
    }

    /// Appends the next attempt. The standing is re-read inside the caller's
    /// transaction, which already holds the enrollment lock, so two
    /// concurrent submissions can never share a number or overrun the limit.
    pub async fn record_attempt(
        tx: &mut dyn StoreTx,
        learner_id: Uuid,
        assessment: AssessmentRef,
        max_attempts: Option<i32>,
        submission: &Submission,
        report: &GradeReport,
        now: DateTime<Utc>,
    ) -> Result<AttemptRecord> {
        let standing = Self::standing(tx, learner_id, assessment, max_attempts).await?;
        standing.ensure_open()?;

        let record = AttemptRecord {
            id: Uuid::new_v4(),
            learner_id,
            assessment,
            attempt_number: standing.next_attempt_number(),
            answers: submission.answers.clone(),
            score: report.score,
            earned_points: report.earned_points,
            total_points: report.total_points,
            passed: report.passed,
            time_spent_seconds: submission.time_spent_seconds,
            completed_at: now,
        };
        tx.insert_attempt(&record).await?;

        tracing::info!(
            kind = assessment.kind(),
            %learner_id,
            attempt_number = record.attempt_number,
            score = record.score,
            passed = record.passed,
            "attempt recorded"
        );
        Ok(record)
    }
}
