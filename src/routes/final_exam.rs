use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::learning_dto::SubmitAnswersPayload,
    error::Result,
    middleware::auth::Claims,
    services::final_exam_service::{FinalExamOutcome, FinalExamView},
    utils::validation::validate,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/courses/{course_id}/final-exam",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Exam questions without answers", body = FinalExamView),
        (status = 403, description = "Exam still locked"),
        (status = 404, description = "Course has no final exam")
    )
)]
#[axum::debug_handler]
pub async fn get_final_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<FinalExamView>> {
    let view = state
        .final_exam_service
        .access(claims.learner_id()?, course_id)
        .await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/api/courses/{course_id}/final-exam",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    request_body = SubmitAnswersPayload,
    responses(
        (status = 200, description = "Attempt graded; certificate issued on pass", body = FinalExamOutcome),
        (status = 400, description = "Answers reference unknown questions"),
        (status = 403, description = "Exam still locked"),
        (status = 409, description = "Attempt limit reached or exam already passed")
    )
)]
#[axum::debug_handler]
pub async fn submit_final_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<SubmitAnswersPayload>,
) -> Result<Json<FinalExamOutcome>> {
    validate(&payload)?;
    let outcome = state
        .final_exam_service
        .submit_final_exam(claims.learner_id()?, course_id, payload)
        .await?;
    Ok(Json(outcome))
}
