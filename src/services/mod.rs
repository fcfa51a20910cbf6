pub mod attempt_service;
pub mod certificate_service;
pub mod enrollment_service;
pub mod final_exam_service;
pub mod gating_service;
pub mod grading_service;
pub mod progress_service;
pub mod quiz_service;
pub mod slide_service;
pub mod unlock_service;
