use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Submitted answers: question number -> selected option id. Missing entries
/// are unanswered.
pub type AnswerSheet = BTreeMap<i32, String>;

/// The assessment an attempt was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AssessmentRef {
    /// Quiz of the module with this id.
    ModuleQuiz(Uuid),
    /// Final exam of the course with this id.
    FinalExam(Uuid),
}

impl AssessmentRef {
    pub fn kind(&self) -> &'static str {
        match self {
            AssessmentRef::ModuleQuiz(_) => "module_quiz",
            AssessmentRef::FinalExam(_) => "final_exam",
        }
    }

    pub fn target_id(&self) -> Uuid {
        match self {
            AssessmentRef::ModuleQuiz(id) | AssessmentRef::FinalExam(id) => *id,
        }
    }

    pub fn from_parts(kind: &str, target_id: Uuid) -> Option<Self> {
        match kind {
            "module_quiz" => Some(AssessmentRef::ModuleQuiz(target_id)),
            "final_exam" => Some(AssessmentRef::FinalExam(target_id)),
            _ => None,
        }
    }
}

/// What a learner hands in for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub answers: AnswerSheet,
    /// Client-measured time on the assessment.
    pub time_spent_seconds: Option<i32>,
}

impl Submission {
    pub fn timed(answers: AnswerSheet, time_spent_seconds: i32) -> Self {
        Self {
            answers,
            time_spent_seconds: Some(time_spent_seconds),
        }
    }
}

impl From<AnswerSheet> for Submission {
    fn from(answers: AnswerSheet) -> Self {
        Self {
            answers,
            time_spent_seconds: None,
        }
    }
}

/// Immutable record of one graded submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttemptRecord {
    pub id: Uuid,
    pub learner_id: Uuid,
    #[schema(value_type = Object)]
    pub assessment: AssessmentRef,
    pub attempt_number: i32,
    #[schema(value_type = Object)]
    pub answers: AnswerSheet,
    pub score: i32,
    pub earned_points: i32,
    pub total_points: i32,
    pub passed: bool,
    pub time_spent_seconds: Option<i32>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assessment_ref_round_trips_through_parts() {
        let id = Uuid::new_v4();
        for assessment in [AssessmentRef::ModuleQuiz(id), AssessmentRef::FinalExam(id)] {
            let rebuilt = AssessmentRef::from_parts(assessment.kind(), assessment.target_id());
            assert_eq!(rebuilt, Some(assessment));
        }
        assert_eq!(AssessmentRef::from_parts("survey", id), None);
    }

    #[test]
    fn answer_sheet_accepts_string_keys_from_json() {
        let sheet: AnswerSheet =
            serde_json::from_value(serde_json::json!({"1": "a", "2": "c"})).unwrap();
        assert_eq!(sheet.get(&2).map(String::as_str), Some("c"));
    }
}
