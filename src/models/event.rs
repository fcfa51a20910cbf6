use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// State transitions raised by a request, returned to the caller so the UI
/// can re-read what changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    ModuleCompleted { module_number: i32 },
    FinalExamUnlocked { course_id: uuid::Uuid },
    CertificateIssued { certificate_number: String },
}
