use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::learning_dto::EnrollmentResponse, error::Result, middleware::auth::Claims,
    services::progress_service::CourseOverview, AppState,
};

#[utoipa::path(
    post,
    path = "/api/courses/{course_id}/enroll",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 201, description = "Enrolled", body = EnrollmentResponse),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Already enrolled")
    )
)]
#[axum::debug_handler]
pub async fn enroll(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let enrollment = state
        .enrollment_service
        .enroll(claims.learner_id()?, course_id)
        .await?;
    Ok((StatusCode::CREATED, Json(EnrollmentResponse::from(enrollment))))
}

#[utoipa::path(
    delete,
    path = "/api/courses/{course_id}/enroll",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Enrollment and module progress removed"),
        (status = 404, description = "Not enrolled")
    )
)]
#[axum::debug_handler]
pub async fn unenroll(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state
        .enrollment_service
        .unenroll(claims.learner_id()?, course_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/courses/{course_id}/progress",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Per-module states and course progress", body = CourseOverview),
        (status = 404, description = "Not enrolled or course not found")
    )
)]
#[axum::debug_handler]
pub async fn get_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseOverview>> {
    let overview = state
        .progress_service
        .course_overview(claims.learner_id()?, course_id)
        .await?;
    Ok(Json(overview))
}
