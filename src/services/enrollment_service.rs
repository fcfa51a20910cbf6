use chrono::Utc;
use uuid::Uuid;

use crate::database::SharedStore;
use crate::error::{Error, Result};
use crate::models::attempt::AssessmentRef;
use crate::models::enrollment::Enrollment;
use crate::services::attempt_service::AttemptService;
use crate::services::certificate_service::CertificateIssuer;
use crate::services::progress_service::LearnerContext;
use crate::services::unlock_service::UnlockPolicy;

#[derive(Clone)]
pub struct EnrollmentService {
    store: SharedStore,
    policy: UnlockPolicy,
    issuer: CertificateIssuer,
}

impl EnrollmentService {
    pub fn new(store: SharedStore, policy: UnlockPolicy, issuer: CertificateIssuer) -> Self {
        Self { store, policy, issuer }
    }

    /// Creates the enrollment. Final exam attempts kept from an earlier
    /// enrollment carry over: counters are rebuilt from the ledger and a
    /// retained pass completes the course and reissues the certificate.
    pub async fn enroll(&self, learner_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let outline = tx
            .course_outline(course_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Course {} not found", course_id)))?;
        if outline.course.published_at.is_none() {
            return Err(Error::NotFound(format!("Course {} not found", course_id)));
        }
        if tx.enrollment_for_update(learner_id, course_id).await?.is_some() {
            return Err(Error::AlreadyEnrolled(course_id));
        }

        let course = &outline.course;
        let mut enrollment = Enrollment::new(learner_id, course_id, now);
        if course.has_final_exam {
            let standing = AttemptService::standing(
                tx.as_mut(),
                learner_id,
                AssessmentRef::FinalExam(course_id),
                course.final_exam_max_attempts,
            )
            .await?;
            standing.seed_enrollment(&mut enrollment);
            if standing.passed {
                enrollment.final_exam_unlocked = true;
                enrollment.mark_started(now);
                self.issuer.on_final_exam_passed(course, &mut enrollment, now);
            }
        }

        match tx.insert_enrollment(&enrollment).await {
            Err(Error::StorageFailure { conflict: true, .. }) => {
                return Err(Error::AlreadyEnrolled(course_id));
            }
            other => other?,
        }
        tx.commit().await?;

        tracing::info!(
            %learner_id,
            %course_id,
            final_exam_attempts = enrollment.final_exam_attempts,
            "learner enrolled"
        );
        Ok(enrollment)
    }

    /// Removes the enrollment and its module progress. Attempt records stay.
    pub async fn unenroll(&self, learner_id: Uuid, course_id: Uuid) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let enrollment = tx
            .enrollment_for_update(learner_id, course_id)
            .await?
            .ok_or(Error::NotEnrolled(course_id))?;
        tx.delete_enrollment(&enrollment).await?;
        tx.commit().await?;

        tracing::info!(%learner_id, %course_id, "learner unenrolled");
        Ok(())
    }

    /// Administrative unlock of the final exam regardless of quiz results.
    pub async fn override_final_exam_unlock(&self, learner_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut ctx = LearnerContext::load(tx.as_mut(), learner_id, course_id).await?;
        if !ctx.outline.course.has_final_exam {
            return Err(Error::NotFound(format!("Course {} has no final exam", course_id)));
        }

        if !ctx.enrollment.final_exam_unlocked {
            ctx.enrollment.final_exam_unlocked = true;
            tracing::warn!(%learner_id, %course_id, "final exam unlocked by override");
        }
        ctx.settle(self.policy, now);
        ctx.persist(tx.as_mut()).await?;
        tx.commit().await?;
        Ok(ctx.enrollment)
    }
}
