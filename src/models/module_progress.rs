use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::course::Module;
use crate::models::enrollment::Enrollment;

/// Per (learner, module) progress, created lazily on first engagement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleProgress {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub course_id: Uuid,
    pub module_id: Uuid,
    pub enrollment_id: Uuid,
    pub completed_slides: BTreeSet<i32>,
    /// Last viewed slide, for resume. Has no bearing on completion.
    pub current_slide: i32,
    /// Cached completion. Written only by `gating_service::settle_module`.
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub quiz_passed: bool,
    pub quiz_best_score: Option<i32>,
    pub quiz_attempts_count: i32,
    pub last_accessed_at: DateTime<Utc>,
}

impl ModuleProgress {
    pub fn new(enrollment: &Enrollment, module: &Module, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_id: enrollment.learner_id,
            course_id: enrollment.course_id,
            module_id: module.id,
            enrollment_id: enrollment.id,
            completed_slides: BTreeSet::new(),
            current_slide: 1,
            is_completed: false,
            completed_at: None,
            quiz_passed: false,
            quiz_best_score: None,
            quiz_attempts_count: 0,
            last_accessed_at: now,
        }
    }

    pub fn slides_viewed(&self) -> i32 {
        self.completed_slides.len() as i32
    }

    pub fn all_slides_viewed(&self, total_slides: i32) -> bool {
        self.slides_viewed() >= total_slides
    }
}
