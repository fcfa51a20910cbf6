use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Learner is not enrolled in course {0}")]
    NotEnrolled(uuid::Uuid),

    #[error("Learner is already enrolled in course {0}")]
    AlreadyEnrolled(uuid::Uuid),

    #[error("Module {0} is locked; complete the previous module first")]
    ModuleLocked(i32),

    #[error("Maximum attempts ({0}) reached")]
    AttemptLimitExceeded(i32),

    #[error("Assessment has already been passed")]
    AlreadyPassed,

    #[error("Final exam is locked; pass every module quiz first")]
    PrerequisiteNotMet,

    #[error("Answers reference unknown questions: {0:?}")]
    InvalidAnswerSet(Vec<i32>),

    #[error("Assessment has no points to award")]
    ZeroPointAssessment,

    #[error("Storage failure: {message}")]
    StorageFailure { message: String, conflict: bool },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn storage(message: impl Into<String>) -> Self {
        Error::StorageFailure {
            message: message.into(),
            conflict: false,
        }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::BadRequest(_) => "bad_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::NotEnrolled(_) => "not_enrolled",
            Error::AlreadyEnrolled(_) => "already_enrolled",
            Error::ModuleLocked(_) => "module_locked",
            Error::AttemptLimitExceeded(_) => "attempt_limit_exceeded",
            Error::AlreadyPassed => "already_passed",
            Error::PrerequisiteNotMet => "prerequisite_not_met",
            Error::InvalidAnswerSet(_) => "invalid_answer_set",
            Error::ZeroPointAssessment => "zero_point_assessment",
            Error::StorageFailure { .. } => "storage_failure",
            Error::Validation(_) => "validation_error",
            Error::Json(_) => "invalid_json",
            Error::Anyhow(_) => "bad_request",
            Error::Io(_) => "internal_error",
        }
    }

    /// Infrastructure faults the caller may retry with backoff. Business
    /// rejections are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StorageFailure { .. })
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Error::BadRequest(_) | Error::Validation(_) | Error::Json(_) | Error::Anyhow(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::InvalidAnswerSet(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) | Error::ModuleLocked(_) | Error::PrerequisiteNotMet => {
                StatusCode::FORBIDDEN
            }
            Error::NotFound(_) | Error::NotEnrolled(_) => StatusCode::NOT_FOUND,
            Error::AlreadyEnrolled(_) | Error::AttemptLimitExceeded(_) | Error::AlreadyPassed => {
                StatusCode::CONFLICT
            }
            Error::ZeroPointAssessment => StatusCode::UNPROCESSABLE_ENTITY,
            Error::StorageFailure { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            Error::StorageFailure { .. } | Error::Config(_) | Error::Io(_) => {
                tracing::error!(error = %self, "request failed");
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message,
            "retryable": self.is_retryable(),
        }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::StorageFailure {
                message: db.to_string(),
                conflict: true,
            },
            other => Error::storage(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Error::storage(err.to_string())
    }
}
