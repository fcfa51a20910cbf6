use axum::Json;
use utoipa::OpenApi;

use crate::dto::learning_dto::{
    AttemptHistoryResponse, EnrollmentResponse, SubmitAnswersPayload, UnlockOverridePayload,
};
use crate::models::attempt::AttemptRecord;
use crate::models::enrollment::EnrollmentStatus;
use crate::models::event::ProgressEvent;
use crate::models::question::{PublicQuestion, QuestionOption, QuestionType};
use crate::services::attempt_service::AttemptStanding;
use crate::services::certificate_service::Certificate;
use crate::services::final_exam_service::{FinalExamOutcome, FinalExamView};
use crate::services::gating_service::ModuleState;
use crate::services::grading_service::{GradeReport, QuestionResult};
use crate::services::progress_service::{CourseOverview, CourseProgress, FinalExamStatus, ModuleStatus};
use crate::services::quiz_service::{QuizOutcome, QuizView};
use crate::services::slide_service::SlideViewOutcome;

#[derive(OpenApi)]
#[openapi(
    paths(
        super::health::health,
        super::courses::enroll,
        super::courses::unenroll,
        super::courses::get_progress,
        super::modules::view_slide,
        super::modules::get_quiz,
        super::modules::submit_quiz,
        super::modules::quiz_attempts,
        super::final_exam::get_final_exam,
        super::final_exam::submit_final_exam,
        super::certificates::get_certificate,
        super::certificates::verify_certificate,
        super::admin::unlock_final_exam,
    ),
    components(schemas(
        AttemptHistoryResponse,
        AttemptRecord,
        AttemptStanding,
        Certificate,
        CourseOverview,
        CourseProgress,
        EnrollmentResponse,
        EnrollmentStatus,
        FinalExamOutcome,
        FinalExamStatus,
        FinalExamView,
        GradeReport,
        ModuleState,
        ModuleStatus,
        ProgressEvent,
        PublicQuestion,
        QuestionOption,
        QuestionType,
        QuestionResult,
        QuizOutcome,
        QuizView,
        SlideViewOutcome,
        SubmitAnswersPayload,
        UnlockOverridePayload,
    )),
    tags((name = "training", description = "Course progression and assessment"))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
