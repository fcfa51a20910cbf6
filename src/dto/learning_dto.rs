use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::attempt::{AnswerSheet, AttemptRecord, Submission};
use crate::models::enrollment::{Enrollment, EnrollmentStatus};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitAnswersPayload {
    /// Question number -> selected option id. Unanswered questions may be
    /// omitted.
    #[schema(value_type = Object)]
    #[serde(default)]
    pub answers: AnswerSheet,
    /// Time spent on the attempt as measured by the client.
    #[validate(range(min = 0, max = 86400))]
    pub time_spent_seconds: Option<i32>,
}

impl From<SubmitAnswersPayload> for Submission {
    fn from(payload: SubmitAnswersPayload) -> Self {
        Submission {
            answers: payload.answers,
            time_spent_seconds: payload.time_spent_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyCertificateQuery {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UnlockOverridePayload {
    #[validate(length(min = 1, max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EnrollmentResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    pub status: EnrollmentStatus,
    pub progress_percentage: i32,
    pub current_module_number: i32,
    pub final_exam_unlocked: bool,
    pub final_exam_passed: bool,
    pub certificate_issued: bool,
    pub enrolled_at: DateTime<Utc>,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(e: Enrollment) -> Self {
        Self {
            id: e.id,
            course_id: e.course_id,
            status: e.status,
            progress_percentage: e.progress_percentage,
            current_module_number: e.current_module_number,
            final_exam_unlocked: e.final_exam_unlocked,
            final_exam_passed: e.final_exam_passed,
            certificate_issued: e.certificate_issued,
            enrolled_at: e.enrolled_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttemptHistoryResponse {
    pub module_number: i32,
    pub attempts: Vec<AttemptRecord>,
    pub best_score: Option<i32>,
}
