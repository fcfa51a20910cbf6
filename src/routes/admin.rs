use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::learning_dto::{EnrollmentResponse, UnlockOverridePayload},
    error::Result,
    middleware::auth::Claims,
    utils::validation::validate,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/admin/courses/{course_id}/learners/{learner_id}/unlock-final-exam",
    params(
        ("course_id" = Uuid, Path, description = "Course ID"),
        ("learner_id" = Uuid, Path, description = "Learner ID")
    ),
    request_body = UnlockOverridePayload,
    responses(
        (status = 200, description = "Final exam unlocked", body = EnrollmentResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Learner not enrolled")
    )
)]
#[axum::debug_handler]
pub async fn unlock_final_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, learner_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UnlockOverridePayload>,
) -> Result<Json<EnrollmentResponse>> {
    validate(&payload)?;
    tracing::info!(
        admin = %claims.sub,
        %learner_id,
        %course_id,
        reason = ?payload.reason,
        "final exam unlock override requested"
    );
    let enrollment = state
        .enrollment_service
        .override_final_exam_unlock(learner_id, course_id)
        .await?;
    Ok(Json(EnrollmentResponse::from(enrollment)))
}
