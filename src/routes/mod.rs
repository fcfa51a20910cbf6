pub mod admin;
pub mod certificates;
pub mod courses;
pub mod docs;
pub mod final_exam;
pub mod health;
pub mod modules;

use axum::{
    routing::{get, post},
    Router,
};

use crate::middleware::auth::{require_admin, require_bearer_auth};
use crate::AppState;

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/api-docs/openapi.json", get(docs::openapi_json))
        .route(
            "/api/certificates/:number/verify",
            get(certificates::verify_certificate),
        );

    let learner_api = Router::new()
        .route(
            "/api/courses/:course_id/enroll",
            post(courses::enroll).delete(courses::unenroll),
        )
        .route("/api/courses/:course_id/progress", get(courses::get_progress))
        .route(
            "/api/courses/:course_id/modules/:module_number/slides/:slide_number",
            post(modules::view_slide),
        )
        .route(
            "/api/courses/:course_id/modules/:module_number/quiz",
            get(modules::get_quiz).post(modules::submit_quiz),
        )
        .route(
            "/api/courses/:course_id/modules/:module_number/quiz/attempts",
            get(modules::quiz_attempts),
        )
        .route(
            "/api/courses/:course_id/final-exam",
            get(final_exam::get_final_exam).post(final_exam::submit_final_exam),
        )
        .route(
            "/api/courses/:course_id/certificate",
            get(certificates::get_certificate),
        )
        .layer(axum::middleware::from_fn(require_bearer_auth));

    let admin_api = Router::new()
        .route(
            "/api/admin/courses/:course_id/learners/:learner_id/unlock-final-exam",
            post(admin::unlock_final_exam),
        )
        .layer(axum::middleware::from_fn(require_admin));

    public
        .merge(learner_api)
        .merge(admin_api)
        .with_state(state)
}
