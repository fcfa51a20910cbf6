use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "enrollment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Enrolled,
    InProgress,
    Completed,
    Dropped,
}

/// One learner's enrollment in one course. `progress_percentage`,
/// `current_module_number` and `status` are caches recomputed from module
/// progress; the exam and certificate flags only ever move from false to true.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Enrollment {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub course_id: Uuid,
    pub status: EnrollmentStatus,
    pub progress_percentage: i32,
    pub current_module_number: i32,
    pub final_exam_unlocked: bool,
    pub final_exam_passed: bool,
    pub final_exam_best_score: Option<i32>,
    pub final_exam_attempts: i32,
    pub certificate_issued: bool,
    pub certificate_issued_at: Option<DateTime<Utc>>,
    pub enrolled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn new(learner_id: Uuid, course_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_id,
            course_id,
            status: EnrollmentStatus::Enrolled,
            progress_percentage: 0,
            current_module_number: 1,
            final_exam_unlocked: false,
            final_exam_passed: false,
            final_exam_best_score: None,
            final_exam_attempts: 0,
            certificate_issued: false,
            certificate_issued_at: None,
            enrolled_at: now,
            started_at: None,
            completed_at: None,
            last_accessed_at: None,
        }
    }

    /// `enrolled -> in_progress` on first engagement. Never moves backwards.
    pub fn mark_started(&mut self, now: DateTime<Utc>) {
        if self.status == EnrollmentStatus::Enrolled {
            self.status = EnrollmentStatus::InProgress;
            self.started_at.get_or_insert(now);
        }
        self.last_accessed_at = Some(now);
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        if self.status != EnrollmentStatus::Completed {
            self.status = EnrollmentStatus::Completed;
            self.completed_at.get_or_insert(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_one_way() {
        let now = Utc::now();
        let mut e = Enrollment::new(Uuid::new_v4(), Uuid::new_v4(), now);
        e.mark_started(now);
        assert_eq!(e.status, EnrollmentStatus::InProgress);
        e.mark_completed(now);
        e.mark_started(now);
        assert_eq!(e.status, EnrollmentStatus::Completed);
        assert_eq!(e.started_at, Some(now));
    }
}
