use std::env;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use training_backend::{
    database::MemoryStore,
    middleware::auth::Claims,
    models::{
        attempt::AssessmentRef,
        course::{Course, CourseOutline, Module},
        question::Question,
    },
    routes,
    services::{certificate_service::CertificateIssuer, unlock_service::UnlockPolicy},
    AppState,
};
use uuid::Uuid;

const JWT_SECRET: &str = "http_test_secret";

fn init_env() {
    dotenvy::dotenv().ok();
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("DATABASE_URL", "postgres://unused@localhost/unused");
    env::set_var("JWT_SECRET", JWT_SECRET);
    env::set_var("CERTIFICATE_SECRET", "cert_test_secret");
    training_backend::config::init_config().ok();
}

fn bearer(sub: Uuid, role: Option<&str>) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
        role: role.map(str::to_string),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {}", token)
}

/// One module with a one-question required quiz, then a two-question exam.
async fn app() -> (Router, Uuid) {
    init_env();
    let course = Course::new("http-course").with_final_exam(50, Some(2));
    let module = Module::new(course.id, 1, 1).with_quiz(true, 100, None);
    let store = MemoryStore::new();
    store
        .publish_questions(
            AssessmentRef::ModuleQuiz(module.id),
            vec![Question::new(1, &["a", "b"], "b", 1)],
        )
        .await;
    store
        .publish_questions(
            AssessmentRef::FinalExam(course.id),
            vec![
                Question::new(1, &["a", "b"], "a", 1).from_module(1),
                Question::new(2, &["a", "b"], "b", 1).from_module(1),
            ],
        )
        .await;
    store
        .publish_course(CourseOutline::new(course.clone(), vec![module]))
        .await;

    let state = AppState::with_settings(
        Arc::new(store),
        UnlockPolicy::AllQuizzes,
        CertificateIssuer::new("ICMS", "cert_test_secret"),
    );
    (routes::router(state), course.id)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn health_and_docs_are_public() {
    let (app, _) = app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/courses/{course_id}/final-exam"].is_object());
}

#[tokio::test]
async fn learner_routes_require_a_token() {
    let (app, course_id) = app().await;
    let uri = format!("/api/courses/{}/progress", course_id);

    let (status, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_authorization");

    let (status, _) = send(&app, "GET", &uri, Some("Bearer not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn full_course_over_http() {
    let (app, course_id) = app().await;
    let learner = Uuid::new_v4();
    let auth = bearer(learner, None);
    let auth = Some(auth.as_str());
    let base = format!("/api/courses/{}", course_id);

    let (status, body) = send(&app, "POST", &format!("{}/enroll", base), auth, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "enrolled");

    let (status, body) = send(&app, "POST", &format!("{}/enroll", base), auth, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_enrolled");

    let (status, body) = send(&app, "GET", &format!("{}/progress", base), auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modules"][0]["state"], "available");
    assert_eq!(body["progress"]["progress_percentage"], 0);

    let (status, body) = send(&app, "GET", &format!("{}/final-exam", base), auth, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "prerequisite_not_met");

    let (status, body) = send(&app, "POST", &format!("{}/modules/1/slides/2", base), auth, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, body) = send(&app, "POST", &format!("{}/modules/1/slides/1", base), auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["all_slides_viewed"], true);
    assert_eq!(body["module_state"], "in_progress");

    let quiz_uri = format!("{}/modules/1/quiz", base);
    let (status, body) = send(&app, "GET", &quiz_uri, auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["questions"][0].get("correct_answer").is_none());

    let (status, body) = send(&app, "POST", &quiz_uri, auth, Some(json!({"answers": {"5": "a"}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_answer_set");

    let (status, body) = send(&app, "POST", &quiz_uri, auth, Some(json!({"answers": {"1": "b"}}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["score"], 100);
    assert_eq!(body["module_state"], "completed");
    let events = body["events"].as_array().unwrap();
    assert!(events.iter().any(|e| e["type"] == "final_exam_unlocked"));

    let (status, body) = send(&app, "POST", &quiz_uri, auth, Some(json!({"answers": {"1": "b"}}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_passed");
    assert_eq!(body["retryable"], false);

    let (status, body) = send(&app, "GET", &format!("{}/attempts", quiz_uri), auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attempts"].as_array().unwrap().len(), 1);
    assert_eq!(body["best_score"], 100);

    let (status, _) = send(&app, "GET", &format!("{}/certificate", base), auth, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let exam_uri = format!("{}/final-exam", base);
    let (status, body) = send(&app, "GET", &exam_uri, auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["questions"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "POST", &exam_uri, auth, Some(json!({"answers": {"1": "a"}}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["score"], 50);
    assert_eq!(body["report"]["passed"], true);
    let number = body["certificate"]["certificate_number"].as_str().unwrap().to_string();
    let code = body["certificate"]["verification_code"].as_str().unwrap().to_string();
    assert!(number.starts_with("ICMS-"));

    let (status, body) = send(&app, "GET", &format!("{}/certificate", base), auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["certificate_number"], number.as_str());

    let verify = format!("/api/certificates/{}/verify?code={}", number, code);
    let (status, body) = send(&app, "GET", &verify, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["course_id"], course_id.to_string());

    let forged = format!("/api/certificates/{}/verify?code=ABCDEFABCDEF", number);
    let (status, _) = send(&app, "GET", &forged, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", &format!("{}/progress", base), auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["certificate_issued"], true);

    let (status, _) = send(&app, "DELETE", &format!("{}/enroll", base), auth, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, "GET", &format!("{}/progress", base), auth, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_enrolled");
}

#[tokio::test]
async fn admin_unlock_requires_admin_role() {
    let (app, course_id) = app().await;
    let learner = Uuid::new_v4();
    let learner_auth = bearer(learner, None);
    send(&app, "POST", &format!("/api/courses/{}/enroll", course_id), Some(&learner_auth), None).await;

    let uri = format!(
        "/api/admin/courses/{}/learners/{}/unlock-final-exam",
        course_id, learner
    );
    let payload = json!({"reason": "migrated from legacy LMS"});

    let (status, body) = send(&app, "POST", &uri, Some(&learner_auth), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let admin_auth = bearer(Uuid::new_v4(), Some("admin"));
    let (status, body) = send(&app, "POST", &uri, Some(&admin_auth), Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["final_exam_unlocked"], true);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/courses/{}/final-exam", course_id),
        Some(&learner_auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
