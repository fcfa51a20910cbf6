pub mod attempt;
pub mod course;
pub mod enrollment;
pub mod event;
pub mod module_progress;
pub mod question;
