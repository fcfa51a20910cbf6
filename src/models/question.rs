use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type, Serialize, Deserialize, ToSchema)]
#[sqlx(type_name = "question_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
}

/// A single-answer question belonging to a module quiz or a course final
/// exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub question_number: i32,
    pub question_text: String,
    #[serde(default)]
    pub question_type: QuestionType,
    pub options: Vec<QuestionOption>,
    pub correct_answer: String,
    /// Shown with the graded result, never before submission.
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default = "default_points")]
    pub points: i32,
    /// Module the question was drawn from; final exam questions only.
    #[serde(default)]
    pub source_module: Option<i32>,
}

fn default_points() -> i32 {
    1
}

impl Question {
    pub fn new(question_number: i32, option_ids: &[&str], correct_answer: &str, points: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            question_number,
            question_text: format!("Question {}", question_number),
            question_type: QuestionType::MultipleChoice,
            options: option_ids
                .iter()
                .map(|id| QuestionOption {
                    id: id.to_string(),
                    text: id.to_string(),
                })
                .collect(),
            correct_answer: correct_answer.to_string(),
            explanation: None,
            points,
            source_module: None,
        }
    }

    /// Two fixed options, `true` and `false`.
    pub fn true_false(question_number: i32, correct: bool, points: i32) -> Self {
        let mut question = Self::new(question_number, &["true", "false"], &correct.to_string(), points);
        question.question_type = QuestionType::TrueFalse;
        for option in &mut question.options {
            option.text = if option.id == "true" { "True" } else { "False" }.to_string();
        }
        question
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.question_text = text.into();
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn from_module(mut self, module_number: i32) -> Self {
        self.source_module = Some(module_number);
        self
    }

    pub fn public_view(&self) -> PublicQuestion {
        PublicQuestion {
            question_number: self.question_number,
            question_text: self.question_text.clone(),
            question_type: self.question_type,
            options: self.options.clone(),
            points: self.points,
            source_module: self.source_module,
        }
    }
}

/// Question as shown to a learner before submission: no correct answer and
/// no explanation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicQuestion {
    pub question_number: i32,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<QuestionOption>,
    pub points: i32,
    pub source_module: Option<i32>,
}
