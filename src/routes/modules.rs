use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::learning_dto::{AttemptHistoryResponse, SubmitAnswersPayload},
    error::Result,
    middleware::auth::Claims,
    services::{
        quiz_service::{QuizOutcome, QuizView},
        slide_service::SlideViewOutcome,
    },
    utils::validation::validate,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/courses/{course_id}/modules/{module_number}/slides/{slide_number}",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("module_number" = i32, Path, description = "Module number, 1-based"),
        ("slide_number" = i32, Path, description = "Slide number, 1-based")
    ),
    responses(
        (status = 200, description = "Slide recorded", body = SlideViewOutcome),
        (status = 400, description = "Slide out of range"),
        (status = 403, description = "Module locked"),
        (status = 404, description = "Not enrolled or module not found")
    )
)]
#[axum::debug_handler]
pub async fn view_slide(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, module_number, slide_number)): Path<(Uuid, i32, i32)>,
) -> Result<Json<SlideViewOutcome>> {
    let outcome = state
        .slide_service
        .mark_viewed(claims.learner_id()?, course_id, module_number, slide_number)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/api/courses/{course_id}/modules/{module_number}/quiz",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("module_number" = i32, Path, description = "Module number, 1-based")
    ),
    responses(
        (status = 200, description = "Quiz questions without answers", body = QuizView),
        (status = 403, description = "Module locked"),
        (status = 404, description = "Module has no quiz")
    )
)]
#[axum::debug_handler]
pub async fn get_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, module_number)): Path<(Uuid, i32)>,
) -> Result<Json<QuizView>> {
    let view = state
        .quiz_service
        .quiz(claims.learner_id()?, course_id, module_number)
        .await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/api/courses/{course_id}/modules/{module_number}/quiz",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("module_number" = i32, Path, description = "Module number, 1-based")
    ),
    request_body = SubmitAnswersPayload,
    responses(
        (status = 200, description = "Attempt graded and recorded", body = QuizOutcome),
        (status = 400, description = "Answers reference unknown questions"),
        (status = 403, description = "Module locked"),
        (status = 409, description = "Attempt limit reached or quiz already passed"),
        (status = 422, description = "Quiz has no points to award")
    )
)]
#[axum::debug_handler]
pub async fn submit_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, module_number)): Path<(Uuid, i32)>,
    Json(payload): Json<SubmitAnswersPayload>,
) -> Result<Json<QuizOutcome>> {
    validate(&payload)?;
    let outcome = state
        .quiz_service
        .submit_quiz(claims.learner_id()?, course_id, module_number, payload)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/api/courses/{course_id}/modules/{module_number}/quiz/attempts",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("module_number" = i32, Path, description = "Module number, 1-based")
    ),
    responses(
        (status = 200, description = "Attempts in submission order", body = AttemptHistoryResponse)
    )
)]
#[axum::debug_handler]
pub async fn quiz_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, module_number)): Path<(Uuid, i32)>,
) -> Result<Json<AttemptHistoryResponse>> {
    let attempts = state
        .quiz_service
        .attempt_history(claims.learner_id()?, course_id, module_number)
        .await?;
    let best_score = attempts.iter().map(|a| a.score).max();
    Ok(Json(AttemptHistoryResponse {
        module_number,
        attempts,
        best_score,
    }))
}
