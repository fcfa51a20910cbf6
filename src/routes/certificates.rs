use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::learning_dto::VerifyCertificateQuery,
    error::Result,
    middleware::auth::Claims,
    services::certificate_service::Certificate,
    utils::validation::validate,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/courses/{course_id}/certificate",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Issued certificate", body = Certificate),
        (status = 404, description = "Not enrolled or not issued yet")
    )
)]
#[axum::debug_handler]
pub async fn get_certificate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Certificate>> {
    let certificate = state
        .certificate_service
        .certificate(claims.learner_id()?, course_id)
        .await?;
    Ok(Json(certificate))
}

#[utoipa::path(
    get,
    path = "/api/certificates/{number}/verify",
    params(
        ("number" = String, Path, description = "Certificate number"),
        VerifyCertificateQuery
    ),
    responses(
        (status = 200, description = "Certificate is genuine", body = Certificate),
        (status = 404, description = "No certificate matches")
    )
)]
#[axum::debug_handler]
pub async fn verify_certificate(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Query(query): Query<VerifyCertificateQuery>,
) -> Result<Json<Certificate>> {
    validate(&query)?;
    let certificate = state.certificate_service.verify(&number, &query.code).await?;
    Ok(Json(certificate))
}
