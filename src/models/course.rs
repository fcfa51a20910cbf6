use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_PASSING_SCORE: i32 = 70;
pub const DEFAULT_FINAL_EXAM_MAX_ATTEMPTS: i32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Course {
    pub id: Uuid,
    pub slug: String,
    pub certificate_enabled: bool,
    pub has_final_exam: bool,
    pub final_exam_passing_score: i32,
    pub final_exam_max_attempts: Option<i32>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Course {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: slug.into(),
            certificate_enabled: true,
            has_final_exam: true,
            final_exam_passing_score: DEFAULT_PASSING_SCORE,
            final_exam_max_attempts: Some(DEFAULT_FINAL_EXAM_MAX_ATTEMPTS),
            published_at: None,
        }
    }

    pub fn without_final_exam(mut self) -> Self {
        self.has_final_exam = false;
        self
    }

    pub fn with_final_exam(mut self, passing_score: i32, max_attempts: Option<i32>) -> Self {
        self.has_final_exam = true;
        self.final_exam_passing_score = passing_score;
        self.final_exam_max_attempts = max_attempts;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Uuid,
    pub module_number: i32,
    pub total_slides: i32,
    pub has_quiz: bool,
    pub quiz_required: bool,
    pub quiz_passing_score: i32,
    pub quiz_max_attempts: Option<i32>,
}

impl Module {
    /// A slides-only module.
    pub fn new(course_id: Uuid, module_number: i32, total_slides: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            course_id,
            module_number,
            total_slides,
            has_quiz: false,
            quiz_required: false,
            quiz_passing_score: DEFAULT_PASSING_SCORE,
            quiz_max_attempts: None,
        }
    }

    pub fn with_quiz(mut self, required: bool, passing_score: i32, max_attempts: Option<i32>) -> Self {
        self.has_quiz = true;
        self.quiz_required = required;
        self.quiz_passing_score = passing_score;
        self.quiz_max_attempts = max_attempts;
        self
    }

    /// Whether a passed quiz is part of this module's completion criteria.
    pub fn requires_quiz(&self) -> bool {
        self.has_quiz && self.quiz_required
    }
}

/// A course together with its modules, sorted by `module_number`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseOutline {
    pub course: Course,
    pub modules: Vec<Module>,
}

impl CourseOutline {
    pub fn new(course: Course, mut modules: Vec<Module>) -> Self {
        modules.sort_by_key(|m| m.module_number);
        Self { course, modules }
    }

    pub fn module(&self, module_number: i32) -> Option<&Module> {
        self.modules.iter().find(|m| m.module_number == module_number)
    }

    pub fn total_modules(&self) -> usize {
        self.modules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_orders_modules_by_number() {
        let course = Course::new("icms");
        let outline = CourseOutline::new(
            course.clone(),
            vec![
                Module::new(course.id, 3, 2),
                Module::new(course.id, 1, 4),
                Module::new(course.id, 2, 1),
            ],
        );
        let numbers: Vec<i32> = outline.modules.iter().map(|m| m.module_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(outline.module(1).map(|m| m.total_slides), Some(4));
        assert!(outline.module(4).is_none());
    }

    #[test]
    fn optional_quiz_is_not_a_completion_requirement() {
        let course_id = Uuid::new_v4();
        assert!(!Module::new(course_id, 1, 3).requires_quiz());
        assert!(!Module::new(course_id, 1, 3).with_quiz(false, 70, None).requires_quiz());
        assert!(Module::new(course_id, 1, 3).with_quiz(true, 70, None).requires_quiz());
    }
}
